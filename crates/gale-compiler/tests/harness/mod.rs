//! Shared helpers for integration tests
//!
//! AST builders, a compiler wired to the listing backend, and `Vm`, a small
//! interpreter for listings so behavior can be checked end to end.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use gale_compiler::ast::{
    Binding, ClassMember, ClassNode, Expr, FunctionNode, Param, Stmt, Suite, VariableNode,
};
use gale_compiler::ir::{CallKind, Instr};
use gale_compiler::{
    Address, AddressMode, CompileError, CompiledClass, CompiledScript, Compiler, CompilerOptions, Constant,
    DataType, FunctionDescriptor, Globals, IrFunction, ListingBackend, StaticRegistry, VariantType,
};

pub const PATH: &str = "res://test.gd";

// ============================================================================
// Compilation
// ============================================================================

pub fn compiler() -> Compiler {
    Compiler::new(
        Arc::new(StaticRegistry::with_core_classes()),
        Arc::new(Globals::new()),
        Arc::new(ListingBackend),
    )
}

pub fn compile(class: &ClassNode) -> Arc<CompiledScript> {
    match compiler().compile(class) {
        Ok(script) => script,
        Err(error) => panic!("compilation failed: {error}"),
    }
}

pub fn compile_with(class: &ClassNode, options: CompilerOptions) -> Arc<CompiledScript> {
    match compiler().with_options(options).compile(class) {
        Ok(script) => script,
        Err(error) => panic!("compilation failed: {error}"),
    }
}

pub fn compile_err(class: &ClassNode) -> CompileError {
    match compiler().compile(class) {
        Ok(_) => panic!("compilation unexpectedly succeeded"),
        Err(error) => error,
    }
}

pub fn listing<'s>(script: &'s CompiledScript, class: &str, function: &str) -> &'s IrFunction {
    script
        .function(class, function)
        .and_then(|f| f.code_as::<IrFunction>())
        .unwrap_or_else(|| panic!("no listing for {class}::{function}"))
}

/// Every listing of the script, lambdas included
pub fn all_listings(script: &CompiledScript) -> Vec<&IrFunction> {
    fn collect<'s>(function: &'s FunctionDescriptor, out: &mut Vec<&'s IrFunction>) {
        if let Some(code) = function.code_as::<IrFunction>() {
            out.push(code);
        }
        for lambda in &function.lambdas {
            collect(lambda, out);
        }
    }
    let mut out = Vec::new();
    for class in script.classes.values() {
        for (_, function) in class.all_functions() {
            collect(function, &mut out);
        }
    }
    out
}

// ============================================================================
// AST builders
// ============================================================================

pub fn class() -> ClassNode {
    ClassNode::new("Test", PATH)
}

pub fn inner_path(name: &str) -> String {
    format!("{PATH}::{name}")
}

pub fn int() -> DataType {
    DataType::int()
}

pub fn ty(kind: VariantType) -> DataType {
    DataType::builtin(kind)
}

pub fn method(name: &str, params: Vec<Param>, body: Vec<Stmt>) -> ClassMember {
    ClassMember::Function(func(name, params, body))
}

pub fn func(name: &str, params: Vec<Param>, body: Vec<Stmt>) -> FunctionNode {
    FunctionNode::new(name, params, DataType::Variant, Suite::new(body))
}

pub fn static_method(name: &str, params: Vec<Param>, body: Vec<Stmt>) -> ClassMember {
    let mut node = func(name, params, body);
    node.is_static = true;
    ClassMember::Function(node)
}

pub fn field(name: &str, ty: DataType, initializer: Option<Expr>) -> ClassMember {
    ClassMember::Variable(VariableNode::new(name, ty, initializer))
}

pub fn var_node(name: &str, ty: DataType, initializer: Option<Expr>) -> VariableNode {
    VariableNode::new(name, ty, initializer)
}

pub fn param(name: &str, ty: DataType) -> Param {
    Param::new(name, ty)
}

pub fn member(name: &str, ty: DataType) -> Expr {
    Expr::ident(name, Binding::Member, ty)
}

pub fn arg(name: &str, ty: DataType) -> Expr {
    Expr::ident(name, Binding::Parameter, ty)
}

pub fn local(name: &str, ty: DataType) -> Expr {
    Expr::local(name, ty)
}

pub fn self_ref() -> Expr {
    Expr::self_ref(PATH)
}

pub fn vector2(x: i64, y: i64) -> Expr {
    Expr::call("Vector2", vec![Expr::int(x), Expr::int(y)], ty(VariantType::Vector2))
}

pub fn ret(expr: Expr) -> Stmt {
    Stmt::ret(Some(expr))
}

pub fn assign(target: Expr, value: Expr) -> Stmt {
    Stmt::expr(Expr::assign(target, value))
}

// ============================================================================
// Listing queries
// ============================================================================

pub fn calls_named<'f>(function: &'f IrFunction, name: &str) -> Vec<&'f Instr> {
    function
        .instructions
        .iter()
        .filter(|i| i.call_name() == Some(name))
        .collect()
}

pub fn call_kinds(function: &IrFunction, name: &str) -> Vec<CallKind> {
    function
        .instructions
        .iter()
        .filter_map(|i| match i {
            Instr::Call { kind, name: n, .. } if n == name => Some(kind.clone()),
            _ => None,
        })
        .collect()
}

pub fn count(function: &IrFunction, predicate: impl Fn(&Instr) -> bool) -> usize {
    function.count(predicate)
}

// ============================================================================
// Interpreter
// ============================================================================

#[derive(Debug)]
pub struct Object {
    pub class: Arc<CompiledClass>,
    pub members: Vec<Value>,
    /// Properties of the native base, created on first write
    pub properties: HashMap<String, Value>,
}

#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Vector2(i64, i64),
    Array(Rc<RefCell<Vec<Value>>>),
    Dict(Rc<RefCell<Vec<(Value, Value)>>>),
    Object(Rc<RefCell<Object>>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => (*a as f64) == *b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Vector2(ax, ay), Value::Vector2(bx, by)) => ax == bx && ay == by,
            (Value::Array(a), Value::Array(b)) => *a.borrow() == *b.borrow(),
            (Value::Dict(a), Value::Dict(b)) => *a.borrow() == *b.borrow(),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Value {
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn dict(pairs: Vec<(Value, Value)>) -> Self {
        Value::Dict(Rc::new(RefCell::new(pairs)))
    }

    pub fn str(value: &str) -> Self {
        Value::Str(value.to_string())
    }

    fn from_constant(constant: &Constant) -> Self {
        match constant {
            Constant::Nil | Constant::NativeClass(_) | Constant::ScriptClass(_) => Value::Nil,
            Constant::Bool(b) => Value::Bool(*b),
            Constant::Int(i) => Value::Int(*i),
            Constant::Float(f) => Value::Float(*f),
            Constant::String(s) | Constant::StringName(s) => Value::Str(s.clone()),
            Constant::Array(items) => Value::array(items.iter().map(Value::from_constant).collect()),
            Constant::Dictionary(pairs) => Value::dict(
                pairs
                    .iter()
                    .map(|(k, v)| (Value::from_constant(k), Value::from_constant(v)))
                    .collect(),
            ),
        }
    }

    pub fn kind(&self) -> VariantType {
        match self {
            Value::Nil => VariantType::Nil,
            Value::Bool(_) => VariantType::Bool,
            Value::Int(_) => VariantType::Int,
            Value::Float(_) => VariantType::Float,
            Value::Str(_) => VariantType::String,
            Value::Vector2(..) => VariantType::Vector2,
            Value::Array(_) => VariantType::Array,
            Value::Dict(_) => VariantType::Dictionary,
            Value::Object(_) => VariantType::Object,
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn as_int(&self) -> i64 {
        match self {
            Value::Int(i) => *i,
            Value::Float(f) => *f as i64,
            Value::Bool(b) => i64::from(*b),
            other => panic!("not a number: {other:?}"),
        }
    }

    pub fn items(&self) -> Vec<Value> {
        match self {
            Value::Array(items) => items.borrow().clone(),
            other => panic!("not an array: {other:?}"),
        }
    }
}

struct Frame {
    /// Path of the class owning the running function
    class: String,
    receiver: Value,
    params: Vec<Value>,
    passed: usize,
    locals: HashMap<u32, Value>,
    temps: HashMap<u32, Value>,
}

/// Matching positions of structured instructions
#[derive(Default)]
struct Links {
    /// `If` to its `Else`, if any
    if_else: HashMap<usize, usize>,
    /// `If` and `Else` to the closing `EndIf`
    if_end: HashMap<usize, usize>,
    /// `AndLeft`/`OrLeft` to the closing `EndAnd`/`EndOr`
    logic_end: HashMap<usize, usize>,
    /// `TernaryCondition` to its `TernaryTrue`
    ternary_false: HashMap<usize, usize>,
    /// `TernaryTrue` to `EndTernary`
    ternary_end: HashMap<usize, usize>,
    /// Loop start (`StartFor`/`StartWhileCondition`) to its end
    loop_end: HashMap<usize, usize>,
    /// `For`/`While`/`EndFor`/`EndWhile` and `break`/`continue` to their loop start
    loop_of: HashMap<usize, usize>,
    /// `StartFor` to its `For` head
    for_head: HashMap<usize, usize>,
    shared_end: HashMap<usize, usize>,
}

impl Links {
    fn build(instructions: &[Instr]) -> Self {
        let mut links = Links::default();
        let mut ifs = Vec::new();
        let mut logic = Vec::new();
        let mut ternaries: Vec<(usize, Option<usize>, Option<usize>)> = Vec::new();
        let mut loops = Vec::new();
        let mut shared = Vec::new();

        for (at, instr) in instructions.iter().enumerate() {
            match instr {
                Instr::If(_) => ifs.push(at),
                Instr::Else => {
                    let open = *ifs.last().expect("else without if");
                    links.if_else.insert(open, at);
                }
                Instr::EndIf => {
                    let open = ifs.pop().expect("endif without if");
                    links.if_end.insert(open, at);
                    if let Some(otherwise) = links.if_else.get(&open) {
                        links.if_end.insert(*otherwise, at);
                    }
                }
                Instr::AndLeft(_) | Instr::OrLeft(_) => logic.push(at),
                Instr::EndAnd(_) | Instr::EndOr(_) => {
                    let open = logic.pop().expect("unbalanced logic");
                    links.logic_end.insert(open, at);
                }
                Instr::StartTernary(_) => ternaries.push((at, None, None)),
                Instr::TernaryCondition(_) => ternaries.last_mut().expect("ternary").1 = Some(at),
                Instr::TernaryTrue(_) => ternaries.last_mut().expect("ternary").2 = Some(at),
                Instr::EndTernary => {
                    let (_, condition, when_true) = ternaries.pop().expect("ternary");
                    let (condition, when_true) = (condition.expect("condition"), when_true.expect("true"));
                    links.ternary_false.insert(condition, when_true);
                    links.ternary_end.insert(when_true, at);
                }
                Instr::StartFor { .. } | Instr::StartWhileCondition => loops.push(at),
                Instr::For { .. } => {
                    let start = *loops.last().expect("for head");
                    links.for_head.insert(start, at);
                    links.loop_of.insert(at, start);
                }
                Instr::While(_) | Instr::Break | Instr::Continue => {
                    let start = *loops.last().expect("loop");
                    links.loop_of.insert(at, start);
                }
                Instr::EndFor { .. } | Instr::EndWhile => {
                    let start = loops.pop().expect("loop end");
                    links.loop_end.insert(start, at);
                    links.loop_of.insert(at, start);
                }
                Instr::JumpIfShared(_) => shared.push(at),
                Instr::EndJumpIfShared => {
                    let open = shared.pop().expect("shared jump");
                    links.shared_end.insert(open, at);
                }
                _ => {}
            }
        }
        links
    }
}

struct Iteration {
    values: Vec<Value>,
    next: usize,
}

/// Executes listings of one compiled script
pub struct Vm {
    pub script: Arc<CompiledScript>,
    statics: HashMap<(String, u32), Value>,
    /// Names of every script function called, in call order
    pub trace: Vec<String>,
}

impl Vm {
    pub fn new(script: Arc<CompiledScript>) -> Self {
        let mut vm = Self {
            script,
            statics: HashMap::new(),
            trace: Vec::new(),
        };
        let mut classes: Vec<Arc<CompiledClass>> = vm.script.classes.values().cloned().collect();
        classes.sort_by(|a, b| a.path.cmp(&b.path));
        for class in classes {
            if let Some(init) = class.static_initializer.clone() {
                vm.run(&init, Value::Nil, Vec::new());
            }
        }
        vm
    }

    fn class(&self, path: &str) -> Arc<CompiledClass> {
        self.script
            .class(path)
            .cloned()
            .unwrap_or_else(|| panic!("no class {path}"))
    }

    /// Create an instance, running the implicit constructors base first
    pub fn instantiate(&mut self, path: &str) -> Value {
        let class = self.class(path);
        let object = Value::Object(Rc::new(RefCell::new(Object {
            class: class.clone(),
            members: vec![Value::Nil; class.member_count as usize],
            properties: HashMap::new(),
        })));
        let mut chain: Vec<&CompiledClass> = class.lineage().collect();
        chain.reverse();
        for step in chain {
            if let Some(init) = step.implicit_new.clone() {
                self.run(&init, object.clone(), Vec::new());
            }
        }
        object
    }

    pub fn ready(&mut self, object: &Value) {
        let Value::Object(data) = object else { panic!("not an object") };
        let class = data.borrow().class.clone();
        if let Some(ready) = class.implicit_ready.clone() {
            self.run(&ready, object.clone(), Vec::new());
        }
    }

    pub fn member(&self, object: &Value, name: &str) -> Value {
        let Value::Object(data) = object else { panic!("not an object") };
        let data = data.borrow();
        let index = data.class.members.get(name).expect("member").index;
        data.members[index as usize].clone()
    }

    pub fn static_value(&self, class: &str, name: &str) -> Value {
        let class = self.class(class);
        let info = class.static_members.get(name).expect("static member");
        self.statics
            .get(&(info.owner.clone(), info.index))
            .cloned()
            .unwrap_or(Value::Nil)
    }

    /// Call a method on an instance
    pub fn call(&mut self, receiver: &Value, name: &str, args: Vec<Value>) -> Value {
        let Value::Object(data) = receiver else { panic!("not an object: {receiver:?}") };
        let class = data.borrow().class.clone();
        let function = class
            .lineage()
            .find_map(|c| c.functions.get(name).cloned())
            .unwrap_or_else(|| panic!("no method {name}"));
        self.run(&function, receiver.clone(), args)
    }

    /// Call a static function of a class
    pub fn call_static(&mut self, class: &str, name: &str, args: Vec<Value>) -> Value {
        let class = self.class(class);
        let function = class
            .lineage()
            .find_map(|c| c.functions.get(name).cloned())
            .unwrap_or_else(|| panic!("no static function {name}"));
        self.run(&function, Value::Nil, args)
    }

    fn run(&mut self, function: &FunctionDescriptor, receiver: Value, args: Vec<Value>) -> Value {
        self.trace.push(function.name.clone());
        let code = function.code_as::<IrFunction>().expect("listing backend");
        let passed = args.len();
        let mut params = args;
        params.resize(code.params.len(), Value::Nil);
        let mut frame = Frame {
            class: function.class_path.clone(),
            receiver,
            params,
            passed,
            locals: HashMap::new(),
            temps: HashMap::new(),
        };
        let links = Links::build(&code.instructions);
        let instructions = &code.instructions;

        let mut logic: Vec<bool> = Vec::new();
        let mut ternaries: Vec<Address> = Vec::new();
        let mut iterations: Vec<Iteration> = Vec::new();
        let mut pc = 0;

        while pc < instructions.len() {
            let at = pc;
            pc += 1;
            match &instructions[at] {
                Instr::Line(_)
                | Instr::DeclareLocal { .. }
                | Instr::PushTemp { .. }
                | Instr::PopTemp { .. }
                | Instr::StartParameters
                | Instr::EndParameters
                | Instr::StartBlock
                | Instr::EndBlock
                | Instr::Breakpoint
                | Instr::EndIf
                | Instr::EndJumpIfShared => {}
                Instr::Clear(target) => self.write(&mut frame, target, Value::Nil),

                Instr::Assign { target, source, .. } => {
                    let value = self.read(&frame, source);
                    self.write(&mut frame, target, value);
                }
                Instr::AssignBool { target, value } => self.write(&mut frame, target, Value::Bool(*value)),
                Instr::AssignDefault { target, source, .. } => {
                    let AddressMode::Parameter(slot) = target.mode else { panic!("default of a non-parameter") };
                    if slot as usize >= frame.passed {
                        let value = self.read(&frame, source);
                        self.write(&mut frame, target, value);
                    }
                }
                Instr::Unary { target, op, operand } => {
                    let value = self.read(&frame, operand);
                    let result = unary(*op, value);
                    self.write(&mut frame, target, result);
                }
                Instr::Binary { target, op, left, right } => {
                    let result = binary(*op, self.read(&frame, left), self.read(&frame, right));
                    self.write(&mut frame, target, result);
                }
                Instr::TypeTest { target, source, ty } => {
                    let value = self.read(&frame, source);
                    let result = ty.variant_type().map_or(true, |kind| kind == value.kind());
                    self.write(&mut frame, target, Value::Bool(result));
                }
                Instr::TypeOf { target, source } => {
                    let tag = self.read(&frame, source).kind().tag();
                    self.write(&mut frame, target, Value::Int(tag));
                }
                Instr::Cast { target, source, .. } => {
                    let value = self.read(&frame, source);
                    self.write(&mut frame, target, value);
                }
                Instr::StoreGlobal { target, .. } | Instr::StoreNamedGlobal { target, .. } => {
                    self.write(&mut frame, target, Value::Nil)
                }

                Instr::AndLeft(value) => {
                    if self.read(&frame, value).truthy() {
                        logic.push(true);
                    } else {
                        logic.push(false);
                        pc = links.logic_end[&at];
                    }
                }
                Instr::OrLeft(value) => {
                    if self.read(&frame, value).truthy() {
                        logic.push(true);
                        pc = links.logic_end[&at];
                    } else {
                        logic.push(false);
                    }
                }
                Instr::AndRight(value) | Instr::OrRight(value) => {
                    let result = self.read(&frame, value).truthy();
                    *logic.last_mut().expect("logic operand") = result;
                }
                Instr::EndAnd(target) | Instr::EndOr(target) => {
                    let result = logic.pop().expect("logic result");
                    self.write(&mut frame, target, Value::Bool(result));
                }

                Instr::StartTernary(target) => ternaries.push(target.clone()),
                Instr::TernaryCondition(condition) => {
                    if !self.read(&frame, condition).truthy() {
                        pc = links.ternary_false[&at] + 1;
                    }
                }
                Instr::TernaryTrue(value) => {
                    let value = self.read(&frame, value);
                    let target = ternaries.last().expect("ternary").clone();
                    self.write(&mut frame, &target, value);
                    pc = links.ternary_end[&at];
                }
                Instr::TernaryFalse(value) => {
                    let value = self.read(&frame, value);
                    let target = ternaries.last().expect("ternary").clone();
                    self.write(&mut frame, &target, value);
                }
                Instr::EndTernary => {
                    ternaries.pop();
                }

                Instr::Get { target, index, source } => {
                    let container = self.read(&frame, source);
                    let key = self.read(&frame, index);
                    let value = get_indexed(&container, &key);
                    self.write(&mut frame, target, value);
                }
                Instr::Set { target, index, source } => {
                    let container = self.read(&frame, target);
                    let key = self.read(&frame, index);
                    let value = self.read(&frame, source);
                    let updated = set_indexed(container, key, value);
                    self.write(&mut frame, target, updated);
                }
                Instr::GetNamed { target, name, source } => {
                    let container = self.read(&frame, source);
                    let value = get_named(&container, name);
                    self.write(&mut frame, target, value);
                }
                Instr::SetNamed { target, name, source } => {
                    let container = self.read(&frame, target);
                    let value = self.read(&frame, source);
                    let updated = set_named(container, name, value);
                    self.write(&mut frame, target, updated);
                }
                Instr::Construct { target, ty, args } => {
                    let args: Vec<Value> = args.iter().map(|a| self.read(&frame, a)).collect();
                    self.write(&mut frame, target, construct(*ty, &args));
                }
                Instr::ConstructArray { target, elements, .. } => {
                    let items = elements.iter().map(|a| self.read(&frame, a)).collect();
                    self.write(&mut frame, target, Value::array(items));
                }
                Instr::ConstructDictionary { target, pairs } => {
                    let values: Vec<Value> = pairs.iter().map(|a| self.read(&frame, a)).collect();
                    let pairs = values.chunks(2).map(|p| (p[0].clone(), p[1].clone())).collect();
                    self.write(&mut frame, target, Value::dict(pairs));
                }

                Instr::Call {
                    target,
                    kind,
                    base,
                    name,
                    args,
                } => {
                    let args: Vec<Value> = args.iter().map(|a| self.read(&frame, a)).collect();
                    let base = base.as_ref().map(|b| (b.clone(), self.read(&frame, b)));
                    let result = self.dispatch(&frame, kind, base, name, args);
                    if let Some(target) = target {
                        self.write(&mut frame, target, result);
                    }
                }
                Instr::Lambda { target, .. } => self.write(&mut frame, target, Value::Nil),
                Instr::Await { target, operand } => {
                    let value = self.read(&frame, operand);
                    self.write(&mut frame, target, value);
                }

                Instr::If(condition) => {
                    if !self.read(&frame, condition).truthy() {
                        pc = match links.if_else.get(&at) {
                            Some(otherwise) => otherwise + 1,
                            None => links.if_end[&at] + 1,
                        };
                    }
                }
                Instr::Else => pc = links.if_end[&at] + 1,
                Instr::JumpIfShared(value) => {
                    if matches!(
                        self.read(&frame, value),
                        Value::Array(_) | Value::Dict(_) | Value::Object(_)
                    ) {
                        pc = links.shared_end[&at] + 1;
                    }
                }

                Instr::StartFor { .. } => iterations.push(Iteration {
                    values: Vec::new(),
                    next: 0,
                }),
                Instr::ForRange { from, to, step } => {
                    let (from, to, step) = (
                        self.read(&frame, from).as_int(),
                        self.read(&frame, to).as_int(),
                        self.read(&frame, step).as_int(),
                    );
                    iterations.last_mut().expect("for").values = range(from, to, step);
                }
                Instr::ForList(list) => {
                    let values = match self.read(&frame, list) {
                        Value::Array(items) => items.borrow().clone(),
                        Value::Dict(pairs) => pairs.borrow().iter().map(|(k, _)| k.clone()).collect(),
                        Value::Int(n) => range(0, n, 1),
                        other => panic!("cannot iterate {other:?}"),
                    };
                    iterations.last_mut().expect("for").values = values;
                }
                Instr::For { variable, .. } => {
                    let iteration = iterations.last_mut().expect("for");
                    if iteration.next < iteration.values.len() {
                        let value = iteration.values[iteration.next].clone();
                        iteration.next += 1;
                        self.write(&mut frame, variable, value);
                    } else {
                        iterations.pop();
                        pc = links.loop_end[&links.loop_of[&at]] + 1;
                    }
                }
                Instr::EndFor { .. } => pc = links.for_head[&links.loop_of[&at]],
                Instr::StartWhileCondition => {}
                Instr::While(condition) => {
                    if !self.read(&frame, condition).truthy() {
                        pc = links.loop_end[&links.loop_of[&at]] + 1;
                    }
                }
                Instr::EndWhile => pc = links.loop_of[&at],
                Instr::Break => {
                    let start = links.loop_of[&at];
                    if matches!(instructions[start], Instr::StartFor { .. }) {
                        iterations.pop();
                    }
                    pc = links.loop_end[&start] + 1;
                }
                Instr::Continue => {
                    let start = links.loop_of[&at];
                    pc = if matches!(instructions[start], Instr::StartFor { .. }) {
                        links.for_head[&start]
                    } else {
                        start
                    };
                }
                Instr::Return(value) => return self.read(&frame, value),
                Instr::Assert { test, .. } => {
                    assert!(self.read(&frame, test).truthy(), "script assertion failed");
                }
            }
        }
        Value::Nil
    }

    fn dispatch(
        &mut self,
        frame: &Frame,
        kind: &CallKind,
        base: Option<(Address, Value)>,
        name: &str,
        args: Vec<Value>,
    ) -> Value {
        match kind {
            CallKind::SelfCall | CallKind::SelfAsync => {
                let receiver = frame.receiver.clone();
                self.call(&receiver, name, args)
            }
            CallKind::ScriptUtility | CallKind::Utility => utility(name, &args),
            CallKind::ScriptFunction => {
                let (address, _) = base.expect("class receiver");
                let AddressMode::Constant(Constant::ScriptClass(path)) = &address.mode else {
                    panic!("static call without a class")
                };
                self.call_static(path, name, args)
            }
            CallKind::Dynamic | CallKind::Async | CallKind::BuiltinType(_) => {
                let (address, value) = base.expect("receiver");
                match value {
                    Value::Object(_) => self.call(&value, name, args),
                    Value::Nil if matches!(address.mode, AddressMode::Class) => {
                        let path = frame.class.clone();
                        self.call_static(&path, name, args)
                    }
                    other => builtin_method(&other, name, &args),
                }
            }
            CallKind::Super | CallKind::MethodBind(_) | CallKind::MethodBindValidated(_) => Value::Nil,
        }
    }

    fn read(&self, frame: &Frame, address: &Address) -> Value {
        match &address.mode {
            AddressMode::SelfRef => frame.receiver.clone(),
            AddressMode::Class | AddressMode::Null => Value::Nil,
            AddressMode::Member(index) => match &frame.receiver {
                Value::Object(data) => data.borrow().members[*index as usize].clone(),
                other => panic!("member read on {other:?}"),
            },
            AddressMode::StaticMember { index, owner } => self
                .statics
                .get(&(owner.clone(), *index))
                .cloned()
                .unwrap_or(Value::Nil),
            AddressMode::Local(slot) => frame.locals.get(slot).cloned().unwrap_or(Value::Nil),
            AddressMode::Temporary(slot) => frame.temps.get(slot).cloned().unwrap_or(Value::Nil),
            AddressMode::Parameter(slot) => frame.params[*slot as usize].clone(),
            AddressMode::Constant(constant) => Value::from_constant(constant),
        }
    }

    fn write(&mut self, frame: &mut Frame, address: &Address, value: Value) {
        match &address.mode {
            AddressMode::Member(index) => match &frame.receiver {
                Value::Object(data) => data.borrow_mut().members[*index as usize] = value,
                other => panic!("member write on {other:?}"),
            },
            AddressMode::StaticMember { index, owner } => {
                self.statics.insert((owner.clone(), *index), value);
            }
            AddressMode::Local(slot) => {
                frame.locals.insert(*slot, value);
            }
            AddressMode::Temporary(slot) => {
                frame.temps.insert(*slot, value);
            }
            AddressMode::Parameter(slot) => frame.params[*slot as usize] = value,
            AddressMode::SelfRef | AddressMode::Class | AddressMode::Null | AddressMode::Constant(_) => {}
        }
    }
}

fn range(from: i64, to: i64, step: i64) -> Vec<Value> {
    let mut out = Vec::new();
    let mut i = from;
    while (step > 0 && i < to) || (step < 0 && i > to) {
        out.push(Value::Int(i));
        i += step;
    }
    out
}

fn unary(op: gale_compiler::ast::UnaryOp, value: Value) -> Value {
    use gale_compiler::ast::UnaryOp;
    match (op, value) {
        (UnaryOp::Not, value) => Value::Bool(!value.truthy()),
        (UnaryOp::Negate, Value::Int(i)) => Value::Int(-i),
        (UnaryOp::Negate, Value::Float(f)) => Value::Float(-f),
        (UnaryOp::BitNot, Value::Int(i)) => Value::Int(!i),
        (_, value) => value,
    }
}

fn binary(op: gale_compiler::ast::BinaryOp, left: Value, right: Value) -> Value {
    use gale_compiler::ast::BinaryOp;
    match op {
        BinaryOp::Equal => return Value::Bool(left == right),
        BinaryOp::NotEqual => return Value::Bool(left != right),
        BinaryOp::And => return Value::Bool(left.truthy() && right.truthy()),
        BinaryOp::Or => return Value::Bool(left.truthy() || right.truthy()),
        BinaryOp::In => {
            return Value::Bool(match &right {
                Value::Array(items) => items.borrow().contains(&left),
                Value::Dict(pairs) => pairs.borrow().iter().any(|(k, _)| *k == left),
                _ => false,
            })
        }
        _ => {}
    }
    match (left, right) {
        (Value::Str(a), Value::Str(b)) if op == BinaryOp::Add => Value::Str(a + &b),
        (Value::Vector2(ax, ay), Value::Vector2(bx, by)) => match op {
            BinaryOp::Add => Value::Vector2(ax + bx, ay + by),
            BinaryOp::Sub => Value::Vector2(ax - bx, ay - by),
            _ => panic!("unsupported vector op {op:?}"),
        },
        (a, b) => {
            let (a, b) = (a.as_int(), b.as_int());
            match op {
                BinaryOp::Add => Value::Int(a + b),
                BinaryOp::Sub => Value::Int(a - b),
                BinaryOp::Mul => Value::Int(a * b),
                BinaryOp::Div => Value::Int(a / b),
                BinaryOp::Mod => Value::Int(a % b),
                BinaryOp::Pow => Value::Int(a.pow(b as u32)),
                BinaryOp::ShiftLeft => Value::Int(a << b),
                BinaryOp::ShiftRight => Value::Int(a >> b),
                BinaryOp::BitAnd => Value::Int(a & b),
                BinaryOp::BitOr => Value::Int(a | b),
                BinaryOp::BitXor => Value::Int(a ^ b),
                BinaryOp::Less => Value::Bool(a < b),
                BinaryOp::LessEqual => Value::Bool(a <= b),
                BinaryOp::Greater => Value::Bool(a > b),
                BinaryOp::GreaterEqual => Value::Bool(a >= b),
                _ => unreachable!(),
            }
        }
    }
}

fn construct(ty: VariantType, args: &[Value]) -> Value {
    match ty {
        VariantType::Vector2 => match args {
            [x, y] => Value::Vector2(x.as_int(), y.as_int()),
            _ => Value::Vector2(0, 0),
        },
        VariantType::Bool => Value::Bool(args.first().is_some_and(Value::truthy)),
        VariantType::Int => Value::Int(args.first().map_or(0, Value::as_int)),
        VariantType::Float => Value::Float(args.first().map_or(0.0, |v| v.as_int() as f64)),
        VariantType::String | VariantType::StringName => Value::Str(String::new()),
        VariantType::Array => Value::array(Vec::new()),
        VariantType::Dictionary => Value::dict(Vec::new()),
        _ => Value::Nil,
    }
}

fn utility(name: &str, args: &[Value]) -> Value {
    match (name, args) {
        ("len", [Value::Array(items)]) => Value::Int(items.borrow().len() as i64),
        ("len", [Value::Dict(pairs)]) => Value::Int(pairs.borrow().len() as i64),
        ("len", [Value::Str(s)]) => Value::Int(s.len() as i64),
        ("range", [to]) => Value::array(range(0, to.as_int(), 1)),
        ("range", [from, to]) => Value::array(range(from.as_int(), to.as_int(), 1)),
        ("range", [from, to, step]) => Value::array(range(from.as_int(), to.as_int(), step.as_int())),
        ("abs", [value]) => Value::Int(value.as_int().abs()),
        ("max", [a, b]) => Value::Int(a.as_int().max(b.as_int())),
        ("min", [a, b]) => Value::Int(a.as_int().min(b.as_int())),
        ("str", [value]) => Value::Str(format!("{value:?}")),
        _ => Value::Nil,
    }
}

fn builtin_method(receiver: &Value, name: &str, args: &[Value]) -> Value {
    match (receiver, name, args) {
        (Value::Array(items), "append", [value]) => {
            items.borrow_mut().push(value.clone());
            Value::Nil
        }
        (Value::Array(items), "size", []) => Value::Int(items.borrow().len() as i64),
        (Value::Dict(pairs), "size", []) => Value::Int(pairs.borrow().len() as i64),
        (Value::Dict(pairs), "has", [key]) => Value::Bool(pairs.borrow().iter().any(|(k, _)| k == key)),
        (other, name, _) => panic!("no method {name} on {other:?}"),
    }
}

fn get_indexed(container: &Value, key: &Value) -> Value {
    match (container, key) {
        (Value::Array(items), Value::Int(i)) => items.borrow().get(*i as usize).cloned().unwrap_or(Value::Nil),
        (Value::Dict(pairs), key) => pairs
            .borrow()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .unwrap_or(Value::Nil),
        (Value::Vector2(..), Value::Str(name)) => get_named(container, name),
        (other, key) => panic!("cannot index {other:?} with {key:?}"),
    }
}

fn set_indexed(container: Value, key: Value, value: Value) -> Value {
    match (&container, &key) {
        (Value::Array(items), Value::Int(i)) => {
            items.borrow_mut()[*i as usize] = value;
        }
        (Value::Dict(pairs), _) => {
            let mut pairs = pairs.borrow_mut();
            match pairs.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = value,
                None => pairs.push((key.clone(), value)),
            }
        }
        (Value::Vector2(..), Value::Str(name)) => return set_named(container.clone(), name, value),
        (other, key) => panic!("cannot index {other:?} with {key:?}"),
    }
    container
}

fn get_named(container: &Value, name: &str) -> Value {
    match (container, name) {
        (Value::Vector2(x, _), "x") => Value::Int(*x),
        (Value::Vector2(_, y), "y") => Value::Int(*y),
        (Value::Object(data), name) => {
            let data = data.borrow();
            match data.class.members.get(name) {
                Some(info) => data.members[info.index as usize].clone(),
                None => data.properties.get(name).cloned().unwrap_or(Value::Nil),
            }
        }
        (Value::Dict(_), name) => get_indexed(container, &Value::str(name)),
        (other, name) => panic!("no property {name} on {other:?}"),
    }
}

fn set_named(container: Value, name: &str, value: Value) -> Value {
    match (container, name) {
        (Value::Vector2(_, y), "x") => Value::Vector2(value.as_int(), y),
        (Value::Vector2(x, _), "y") => Value::Vector2(x, value.as_int()),
        (Value::Object(data), name) => {
            {
                let mut object = data.borrow_mut();
                match object.class.members.get(name).map(|info| info.index) {
                    Some(index) => object.members[index as usize] = value,
                    None => {
                        object.properties.insert(name.to_string(), value);
                    }
                }
            }
            Value::Object(data)
        }
        (dict @ Value::Dict(_), name) => set_indexed(dict, Value::str(name), value),
        (other, name) => panic!("no property {name} on {other:?}"),
    }
}
