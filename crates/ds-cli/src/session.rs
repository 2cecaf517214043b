use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result};
use ds_core::DsValue;
use ds_runtime::{DialogueEngine, DialogueEvent};

/// Wires stdout printing into the engine's notifications. The running flag
/// flips when the dialogue completes so the input loop can stop.
pub(crate) fn attach_console_listeners(engine: &mut DialogueEngine) -> Rc<RefCell<bool>> {
    let running = Rc::new(RefCell::new(true));
    let flag = Rc::clone(&running);

    engine.on_event(Box::new(move |event| match event {
        DialogueEvent::DialogueStarted => println!("--- dialogue started ---"),
        DialogueEvent::NodeStarted(name) => log::debug!("node started: {}", name),
        DialogueEvent::DialogueUpdated(block) => {
            if block.speaker.is_empty() {
                println!("{}", block.text);
            } else {
                println!("{}: {}", block.speaker, block.text);
            }
            for (index, option) in block.options.iter().enumerate() {
                println!("  {}. {}", index + 1, option.text);
            }
        }
        DialogueEvent::CommandExecuted(kind) => log::debug!("command executed: {}", kind.keyword()),
        DialogueEvent::OptionSelected(index) => log::debug!("option selected: {}", index),
        DialogueEvent::DialogueCompleted => {
            println!("--- dialogue completed ---");
            *flag.borrow_mut() = false;
        }
        DialogueEvent::LanguageChanged(language) => log::debug!("language changed: {}", language),
    }));

    running
}

/// Blank input continues, a number picks that option, `q` quits.
pub(crate) fn run_interactive(engine: &mut DialogueEngine, entry_node: &str) -> Result<()> {
    let running = attach_console_listeners(engine);

    engine.say(Some(entry_node), 0);
    if !engine.is_active() {
        println!("Nothing to play: node \"{}\" did not start.", entry_node);
        return Ok(());
    }

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    while *running.borrow() {
        print!("> ");
        io::stdout().flush().ok();

        let Some(line) = lines.next() else {
            break;
        };
        let line = line.context("failed to read stdin")?;
        let input = line.trim();

        if input == "q" {
            engine.end_say(true);
            break;
        }
        if input.is_empty() {
            engine.continue_say();
            continue;
        }
        match input.parse::<usize>() {
            Ok(number) if number >= 1 => engine.select_option(number - 1),
            _ => println!("Invalid input: enter nothing to continue, a number, or q"),
        }
    }

    Ok(())
}

pub(crate) fn load_variables(engine: &mut DialogueEngine, path: &str) -> Result<()> {
    if !Path::new(path).exists() {
        return Ok(());
    }
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read {}", path))?;
    let variables: BTreeMap<String, DsValue> =
        serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path))?;
    engine.variables_mut().load(variables);
    log::info!("Loaded variables from {}", path);
    Ok(())
}

pub(crate) fn save_variables(engine: &DialogueEngine, path: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(engine.variables().script_variables())
        .context("failed to serialize variables")?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path))?;
    log::info!("Saved variables to {}", path);
    Ok(())
}
