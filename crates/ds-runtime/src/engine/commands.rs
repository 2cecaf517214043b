use std::thread;
use std::time::Duration;

use ds_core::{Command, CommandKind};
use regex::Regex;

use super::*;

impl DialogueEngine {
    /// Runs a block's or option's command list strictly in order. The
    /// executing flag guards re-entrant advancement for the whole span and is
    /// released no matter how the individual commands fare; one command's
    /// failure never stops the rest.
    pub(super) fn execute_commands(&mut self, commands: &[Command]) {
        if commands.is_empty() {
            return;
        }
        if self.is_executing {
            return;
        }

        self.is_executing = true;
        for command in commands {
            self.execute_command(command);
        }
        self.is_executing = false;
    }

    fn execute_command(&mut self, command: &Command) {
        match command.kind {
            CommandKind::Var => {
                let Some((name, value_expr)) = split_assignment(&command.expression) else {
                    log::warn!("Invalid variable declaration: {}", command.expression);
                    return;
                };
                // `var` declares only when the variable is absent.
                if self.variables.get(&name).is_some() {
                    return;
                }
                match self.evaluator.evaluate(&self.variables, &value_expr) {
                    Ok(value) => {
                        self.variables.set(&name, value);
                        self.events
                            .emit(&DialogueEvent::CommandExecuted(CommandKind::Var));
                    }
                    Err(error) => {
                        log::error!("Error executing command: {}: {}", command.expression, error)
                    }
                }
            }
            CommandKind::Set | CommandKind::Add | CommandKind::Sub => {
                let Some((name, value_expr)) = split_assignment(&command.expression) else {
                    log::warn!("Invalid assignment statement: {}", command.expression);
                    return;
                };
                match self.evaluator.evaluate(&self.variables, &value_expr) {
                    Ok(value) => {
                        self.variables.set(&name, value);
                        self.events
                            .emit(&DialogueEvent::CommandExecuted(command.kind));
                    }
                    Err(error) => {
                        log::error!("Error executing command: {}: {}", command.expression, error)
                    }
                }
            }
            CommandKind::Wait => match self.evaluator.evaluate(&self.variables, &command.expression)
            {
                Ok(value) => match value.as_number() {
                    Some(seconds) if seconds > 0.0 => {
                        // The notification fires before the suspension begins;
                        // only the command sequencer sleeps.
                        self.events
                            .emit(&DialogueEvent::CommandExecuted(CommandKind::Wait));
                        thread::sleep(Duration::from_secs_f64(seconds));
                    }
                    _ => log::warn!(
                        "Wait duration must be a positive number: {}",
                        command.expression
                    ),
                },
                Err(error) => {
                    log::error!("Error executing command: {}: {}", command.expression, error)
                }
            },
            CommandKind::Call => {
                match self.evaluator.evaluate(&self.variables, &command.expression) {
                    Ok(_) => self
                        .events
                        .emit(&DialogueEvent::CommandExecuted(CommandKind::Call)),
                    Err(error) => {
                        log::error!("Error executing command: {}: {}", command.expression, error)
                    }
                }
            }
        }
    }
}

fn split_assignment(expression: &str) -> Option<(String, String)> {
    let pattern = Regex::new(r"^([a-zA-Z_][a-zA-Z0-9_]*)\s*=\s*(.+)$")
        .expect("assignment regex must compile");
    let captures = pattern.captures(expression.trim())?;
    Some((captures[1].to_string(), captures[2].to_string()))
}
