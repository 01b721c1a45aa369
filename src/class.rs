//! Classes and instances.
//!
//! Method lookup walks the `superclass` pointer at call time; there is no
//! flattened method table. Instances of built‑in classes additionally carry
//! a [`NativeState`] payload (the element vector behind `List`).

use std::cell::{RefCell, RefMut};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::callable::{Callable, Function, NativeMethod};
use crate::interpreter::{IResult, Interpreter};
use crate::value::Value;

pub struct Class {
    pub name: String,
    pub superclass: Option<Rc<Class>>,
    methods: HashMap<String, Rc<Function>>,
}

impl Class {
    pub fn new(
        name: String,
        superclass: Option<Rc<Class>>,
        methods: HashMap<String, Rc<Function>>,
    ) -> Self {
        debug!("Creating class '{}' with {} method(s)", name, methods.len());

        Class {
            name,
            superclass,
            methods,
        }
    }

    /// A class whose methods are host closures.
    pub fn native(
        name: &str,
        superclass: Option<Rc<Class>>,
        methods: Vec<(&str, usize, Rc<NativeMethod>)>,
    ) -> Self {
        let methods: HashMap<String, Rc<Function>> = methods
            .into_iter()
            .map(|(method, arity, body)| {
                (method.to_string(), Rc::new(Function::native(method, arity, body)))
            })
            .collect();

        Class::new(name.to_string(), superclass, methods)
    }

    /// Own methods first, then the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<Function>> {
        if let Some(method) = self.methods.get(name) {
            return Some(method.clone());
        }

        self.superclass
            .as_ref()
            .and_then(|superclass| superclass.find_method(name))
    }

    /// Is `self` the class `other` or one of its descendants?
    pub fn inherits_from(&self, other: &Class) -> bool {
        let mut current: Option<&Class> = Some(self);

        while let Some(class) = current {
            if std::ptr::eq(class, other) {
                return true;
            }
            current = class.superclass.as_deref();
        }

        false
    }
}

impl Callable for Class {
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> usize {
        self.find_method("init").map_or(0, |init| init.arity())
    }

    fn call(self: Rc<Self>, interpreter: &mut Interpreter, arguments: &[Value]) -> IResult<Value> {
        let instance: Rc<Instance> = Rc::new(Instance::new(self.clone()));

        if let Some(initializer) = self.find_method("init") {
            initializer
                .bind(instance.clone())
                .call(interpreter, arguments)?;
        }

        Ok(Value::Instance(instance))
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<class {}>", self.name)
    }
}

/// Host data attached to instances of built‑in classes.
#[derive(Debug, Default)]
pub enum NativeState {
    #[default]
    None,
    List(Vec<Value>),
}

pub struct Instance {
    pub class: Rc<Class>,
    fields: RefCell<HashMap<String, Value>>,
    native: RefCell<NativeState>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Instance {
            class,
            fields: RefCell::new(HashMap::new()),
            native: RefCell::new(NativeState::None),
        }
    }

    pub fn field(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.borrow().contains_key(name)
    }

    pub fn set_field(&self, name: &str, value: Value) {
        self.fields.borrow_mut().insert(name.to_string(), value);
    }

    /// Snapshot of the fields, ordered by name.
    pub fn fields(&self) -> Vec<(String, Value)> {
        let mut fields: Vec<(String, Value)> = self
            .fields
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        fields.sort_by(|a, b| a.0.cmp(&b.0));
        fields
    }

    /// Property lookup: fields shadow methods; methods come back bound.
    pub fn get(self: &Rc<Self>, name: &str) -> Option<Value> {
        if let Some(value) = self.field(name) {
            return Some(value);
        }

        self.class
            .find_method(name)
            .map(|method| Value::Function(method.bind(self.clone())))
    }

    pub fn native_state(&self) -> RefMut<'_, NativeState> {
        self.native.borrow_mut()
    }

    pub fn is_empty_list(&self) -> bool {
        matches!(&*self.native.borrow(), NativeState::List(items) if items.is_empty())
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}> instance", self.class.name)
    }
}
