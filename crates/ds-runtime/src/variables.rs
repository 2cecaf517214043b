use std::collections::BTreeMap;
use std::rc::Rc;

use ds_core::DsValue;

pub type VarGetter = Rc<dyn Fn() -> DsValue>;
pub type VarSetter = Rc<dyn Fn(DsValue)>;

struct BuiltinVariable {
    getter: VarGetter,
    setter: VarSetter,
}

/// Name → value map backing the expression scope. Host-registered builtin
/// variables resolve through getter/setter closures; everything a script
/// declares lives in a plain map. Names are case-insensitive.
#[derive(Default)]
pub struct VariableStore {
    builtins: BTreeMap<String, BuiltinVariable>,
    scripted: BTreeMap<String, DsValue>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicit registration replaces the original's reflection scan: hosts
    /// wire each variable up with a getter and a setter at startup.
    pub fn register_builtin(
        &mut self,
        name: &str,
        getter: impl Fn() -> DsValue + 'static,
        setter: impl Fn(DsValue) + 'static,
    ) {
        let name = name.to_lowercase();
        if name.is_empty() {
            log::error!("Variable name cannot be empty");
            return;
        }
        self.builtins.insert(
            name,
            BuiltinVariable {
                getter: Rc::new(getter),
                setter: Rc::new(setter),
            },
        );
    }

    pub fn set(&mut self, name: &str, value: DsValue) {
        let name = name.to_lowercase();
        if let Some(builtin) = self.builtins.get(&name) {
            (builtin.setter)(value);
            return;
        }
        self.scripted.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<DsValue> {
        let name = name.to_lowercase();
        if let Some(builtin) = self.builtins.get(&name) {
            return Some((builtin.getter)());
        }
        self.scripted.get(&name).cloned()
    }

    pub fn exists(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.builtins.contains_key(&name) || self.scripted.contains_key(&name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut out: Vec<String> = self.builtins.keys().cloned().collect();
        out.extend(self.scripted.keys().cloned());
        out
    }

    /// Only script-declared variables persist; builtins belong to the host.
    pub fn script_variables(&self) -> &BTreeMap<String, DsValue> {
        &self.scripted
    }

    pub fn load(&mut self, variables: BTreeMap<String, DsValue>) {
        for (name, value) in variables {
            let name = name.to_lowercase();
            if self.builtins.contains_key(&name) {
                continue;
            }
            self.scripted.insert(name, value);
        }
    }

    /// Every visible binding, resolved through getters, for building an
    /// expression scope.
    pub(crate) fn scope_bindings(&self) -> Vec<(String, DsValue)> {
        let mut out = Vec::with_capacity(self.builtins.len() + self.scripted.len());
        for (name, builtin) in &self.builtins {
            out.push((name.clone(), (builtin.getter)()));
        }
        for (name, value) in &self.scripted {
            out.push((name.clone(), value.clone()));
        }
        out
    }
}
