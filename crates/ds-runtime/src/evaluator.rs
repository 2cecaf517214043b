use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use ds_core::{DialogueScriptError, DsValue};
use rand::Rng;
use rhai::{Dynamic, Engine, EvalAltResult, ImmutableString, Position, Scope, FLOAT, INT};

use crate::localization::LocalizationCatalog;
use crate::progress::DialogueProgress;
use crate::registry::NodeRegistry;
use crate::value_bridge::{dynamic_to_value, value_to_dynamic};
use crate::variables::VariableStore;

/// A host-registered callable reachable from script expressions.
pub type HostFunction = Rc<dyn Fn(&[DsValue]) -> Result<DsValue, DialogueScriptError>>;

/// The embedded expression engine behind the `evaluate`/`evaluate_condition`
/// contract. Variables are pushed into a fresh scope per call; host functions
/// and the script built-ins are registered on the engine itself.
pub struct ExpressionRunner {
    engine: Engine,
    function_names: BTreeSet<String>,
}

impl ExpressionRunner {
    pub fn new(
        localization: Rc<RefCell<LocalizationCatalog>>,
        progress: Rc<RefCell<DialogueProgress>>,
        registry: Rc<RefCell<NodeRegistry>>,
    ) -> Self {
        let mut engine = Engine::new();
        engine.set_strict_variables(true);

        let mut function_names = BTreeSet::new();

        let for_localize = Rc::clone(&localization);
        engine.register_fn("l", move |key: ImmutableString| -> String {
            for_localize.borrow().text(key.as_str())
        });
        function_names.insert("l".to_string());

        engine.register_fn("log", |message: Dynamic| {
            log::info!("{}", message);
        });
        function_names.insert("log".to_string());

        let visited_progress = Rc::clone(&progress);
        let visited_registry = Rc::clone(&registry);
        engine.register_fn("visited", move |name: ImmutableString| -> bool {
            node_visit_count(&visited_progress, &visited_registry, name.as_str()) > 0
        });
        function_names.insert("visited".to_string());

        let count_progress = Rc::clone(&progress);
        let count_registry = Rc::clone(&registry);
        engine.register_fn("visited_count", move |name: ImmutableString| -> INT {
            node_visit_count(&count_progress, &count_registry, name.as_str()) as INT
        });
        function_names.insert("visited_count".to_string());

        engine.register_fn("random", || -> FLOAT { rounded_unit_random(2) });
        engine.register_fn("random", |digits: INT| -> FLOAT { rounded_unit_random(digits) });
        function_names.insert("random".to_string());

        engine.register_fn("random_range", |min: FLOAT, max: FLOAT| -> FLOAT {
            rounded_range_random(min, max, 2)
        });
        engine.register_fn("random_range", |min: INT, max: INT| -> FLOAT {
            rounded_range_random(min as FLOAT, max as FLOAT, 2)
        });
        engine.register_fn(
            "random_range",
            |min: FLOAT, max: FLOAT, digits: INT| -> FLOAT { rounded_range_random(min, max, digits) },
        );
        function_names.insert("random_range".to_string());

        engine.register_fn(
            "dice",
            |sides: INT| -> Result<INT, Box<EvalAltResult>> {
                if sides <= 0 {
                    return Err(Box::new(EvalAltResult::ErrorRuntime(
                        Dynamic::from("dice(n) expects a positive number of sides."),
                        Position::NONE,
                    )));
                }
                Ok(rand::rng().random_range(1..=sides))
            },
        );
        function_names.insert("dice".to_string());

        Self {
            engine,
            function_names,
        }
    }

    /// Registers a host callable under `name` for arities 0 through 4.
    pub fn register_function(&mut self, name: &str, function: HostFunction) {
        let name = name.to_lowercase();
        self.function_names.insert(name.clone());

        let f = Rc::clone(&function);
        self.engine.register_fn(
            name.clone(),
            move || -> Result<Dynamic, Box<EvalAltResult>> { apply_host(&f, Vec::new()) },
        );
        let f = Rc::clone(&function);
        self.engine.register_fn(
            name.clone(),
            move |a: Dynamic| -> Result<Dynamic, Box<EvalAltResult>> { apply_host(&f, vec![a]) },
        );
        let f = Rc::clone(&function);
        self.engine.register_fn(
            name.clone(),
            move |a: Dynamic, b: Dynamic| -> Result<Dynamic, Box<EvalAltResult>> {
                apply_host(&f, vec![a, b])
            },
        );
        let f = Rc::clone(&function);
        self.engine.register_fn(
            name.clone(),
            move |a: Dynamic, b: Dynamic, c: Dynamic| -> Result<Dynamic, Box<EvalAltResult>> {
                apply_host(&f, vec![a, b, c])
            },
        );
        let f = Rc::clone(&function);
        self.engine.register_fn(
            name,
            move |a: Dynamic,
                  b: Dynamic,
                  c: Dynamic,
                  d: Dynamic|
                  -> Result<Dynamic, Box<EvalAltResult>> {
                apply_host(&f, vec![a, b, c, d])
            },
        );
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.function_names.contains(&name.to_lowercase())
    }

    pub fn evaluate(
        &self,
        variables: &VariableStore,
        expression: &str,
    ) -> Result<DsValue, DialogueScriptError> {
        let mut scope = Scope::new();
        for (name, value) in variables.scope_bindings() {
            scope.push_dynamic(name, value_to_dynamic(&value));
        }

        let wrapped = format!("({})", expression);
        let result = self
            .engine
            .eval_with_scope::<Dynamic>(&mut scope, &wrapped)
            .map_err(|error| {
                DialogueScriptError::new(
                    "EVAL_ERROR",
                    format!("Expression eval failed: {}: {}", expression, error),
                )
            })?;

        dynamic_to_value(result)
    }

    /// Empty condition = true; evaluation error or a non-boolean result is
    /// logged and counts as false. Never propagates to the caller.
    pub fn evaluate_condition(&self, variables: &VariableStore, condition: &str) -> bool {
        if condition.trim().is_empty() {
            return true;
        }
        match self.evaluate(variables, condition) {
            Ok(DsValue::Bool(value)) => value,
            Ok(other) => {
                log::error!(
                    "Condition \"{}\" must evaluate to boolean, got {}",
                    condition,
                    other.type_name()
                );
                false
            }
            Err(error) => {
                log::error!("Condition evaluation error: {}", error);
                false
            }
        }
    }
}

fn node_visit_count(
    progress: &Rc<RefCell<DialogueProgress>>,
    registry: &Rc<RefCell<NodeRegistry>>,
    name: &str,
) -> usize {
    if name.is_empty() {
        log::error!("Node name cannot be empty");
        return 0;
    }
    if !registry.borrow().contains(name) {
        log::error!("Node not found: {}", name);
        return 0;
    }
    progress.borrow().total_node_visit_count(name)
}

fn rounded_unit_random(digits: INT) -> FLOAT {
    let factor = 10f64.powi(digits.clamp(0, 12) as i32);
    let value: f64 = rand::rng().random_range(0.0..1.0);
    (value * factor).round() / factor
}

fn rounded_range_random(min: FLOAT, max: FLOAT, digits: INT) -> FLOAT {
    let (low, high) = if min <= max { (min, max) } else { (max, min) };
    let factor = 10f64.powi(digits.clamp(0, 12) as i32);
    let value: f64 = rand::rng().random_range(low..=high);
    (value * factor).round() / factor
}

fn apply_host(
    function: &HostFunction,
    args: Vec<Dynamic>,
) -> Result<Dynamic, Box<EvalAltResult>> {
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(dynamic_to_value(arg).map_err(host_error)?);
    }
    let out = function(&values).map_err(host_error)?;
    Ok(value_to_dynamic(&out))
}

fn host_error(error: DialogueScriptError) -> Box<EvalAltResult> {
    Box::new(EvalAltResult::ErrorRuntime(
        Dynamic::from(error.to_string()),
        Position::NONE,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ds_core::{DialogueBlock, DialogueNode};

    fn runner() -> (
        ExpressionRunner,
        VariableStore,
        Rc<RefCell<DialogueProgress>>,
        Rc<RefCell<NodeRegistry>>,
    ) {
        let localization = Rc::new(RefCell::new(LocalizationCatalog::default()));
        let progress = Rc::new(RefCell::new(DialogueProgress::new()));
        let registry = Rc::new(RefCell::new(NodeRegistry::new()));
        let evaluator = ExpressionRunner::new(
            localization,
            Rc::clone(&progress),
            Rc::clone(&registry),
        );
        (evaluator, VariableStore::new(), progress, registry)
    }

    #[test]
    fn evaluates_expressions_over_store_variables() {
        let (evaluator, mut variables, _, _) = runner();
        variables.set("gold", DsValue::Int(7));

        let value = evaluator
            .evaluate(&variables, "gold + 3")
            .expect("expression should evaluate");
        assert_eq!(value, DsValue::Int(10));
    }

    #[test]
    fn empty_condition_is_true_and_errors_are_false() {
        let (evaluator, variables, _, _) = runner();
        assert!(evaluator.evaluate_condition(&variables, ""));
        assert!(evaluator.evaluate_condition(&variables, "   "));
        assert!(!evaluator.evaluate_condition(&variables, "missing_var > 1"));
        assert!(!evaluator.evaluate_condition(&variables, "1 + 1"));
        assert!(evaluator.evaluate_condition(&variables, "1 == 1"));
    }

    #[test]
    fn compiled_guard_shapes_evaluate() {
        let (evaluator, mut variables, _, _) = runner();
        variables.set("a", DsValue::Bool(false));
        variables.set("b", DsValue::Bool(true));
        assert!(evaluator.evaluate_condition(&variables, "!(a) && (b)"));
        assert!(!evaluator.evaluate_condition(&variables, "!(a || b)"));
    }

    #[test]
    fn host_functions_register_for_small_arities() {
        let (mut evaluator, variables, _, _) = runner();
        evaluator.register_function(
            "sum",
            Rc::new(|args: &[DsValue]| {
                let total = args.iter().filter_map(DsValue::as_number).sum::<f64>();
                Ok(DsValue::Float(total))
            }),
        );

        assert!(evaluator.has_function("sum"));
        assert!(evaluator.has_function("SUM"));
        assert!(!evaluator.has_function("missing"));

        let value = evaluator
            .evaluate(&variables, "sum(1, 2, 3)")
            .expect("host function should evaluate");
        assert_eq!(value, DsValue::Float(6.0));
    }

    #[test]
    fn host_function_errors_surface_as_eval_errors() {
        let (mut evaluator, variables, _, _) = runner();
        evaluator.register_function(
            "explode",
            Rc::new(|_: &[DsValue]| {
                Err(DialogueScriptError::new("HOST_BOOM", "refused"))
            }),
        );

        let error = evaluator
            .evaluate(&variables, "explode()")
            .expect_err("host error should propagate as eval error");
        assert_eq!(error.code, "EVAL_ERROR");
    }

    #[test]
    fn visited_builtins_read_the_ledger() {
        let (evaluator, variables, progress, registry) = runner();
        registry.borrow_mut().register(DialogueNode {
            name: "start".to_string(),
            is_internal: false,
            return_node: None,
            blocks: vec![DialogueBlock::default()],
        });

        assert!(!evaluator
            .evaluate_condition(&variables, "visited(\"start\")"));

        progress.borrow_mut().record_section("s1");
        progress.borrow_mut().record_node("start");
        progress.borrow_mut().record_node("start");

        assert!(evaluator.evaluate_condition(&variables, "visited(\"start\")"));
        assert_eq!(
            evaluator
                .evaluate(&variables, "visited_count(\"start\")")
                .expect("visited_count should evaluate"),
            DsValue::Int(2)
        );
        // Unknown nodes count zero instead of failing.
        assert_eq!(
            evaluator
                .evaluate(&variables, "visited_count(\"nowhere\")")
                .expect("unknown node should evaluate to zero"),
            DsValue::Int(0)
        );
    }

    #[test]
    fn dice_stays_in_bounds_and_rejects_nonpositive_sides() {
        let (evaluator, variables, _, _) = runner();
        for _ in 0..20 {
            let value = evaluator
                .evaluate(&variables, "dice(6)")
                .expect("dice should evaluate");
            let DsValue::Int(rolled) = value else {
                panic!("dice should return an integer");
            };
            assert!((1..=6).contains(&rolled));
        }
        assert!(evaluator.evaluate(&variables, "dice(0)").is_err());
    }

    #[test]
    fn random_builtins_respect_their_ranges() {
        let (evaluator, variables, _, _) = runner();
        for _ in 0..20 {
            let value = evaluator
                .evaluate(&variables, "random()")
                .expect("random should evaluate")
                .as_number()
                .expect("random should be numeric");
            assert!((0.0..=1.0).contains(&value));

            let ranged = evaluator
                .evaluate(&variables, "random_range(2, 5)")
                .expect("random_range should evaluate")
                .as_number()
                .expect("random_range should be numeric");
            assert!((2.0..=5.0).contains(&ranged));
        }
    }
}
