//! Class Compiler
//!
//! Classes of one script live in an arena indexed by [`ClassId`]. Every class
//! is prepared (base first) before any function body is compiled, so bodies
//! can refer to members, constants and signals declared anywhere in the
//! script. Artifacts are published only once the whole script compiled.

use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

use super::function::FunctionCompiler;
use super::{CompileContext, Compiler, DEFAULT_BASE};
use crate::ast::{Accessor, ClassMember, ClassNode, Extends, Pos};
use crate::emitter::FunctionDescriptor;
use crate::error::{CompileError, CompileResult, FirstError};
use crate::registry::NativeRegistry;
use crate::script::{CompiledClass, CompiledScript, MemberInfo};
use crate::types::{Constant, DataType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ClassId(usize);

/// Resolved base of a class
#[derive(Debug, Clone)]
pub(crate) enum BaseClass {
    Native(String),
    /// A class of the script being compiled
    Local(ClassId),
    /// The root class of another, already compiled script
    Compiled(Arc<CompiledClass>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PrepState {
    Unprepared,
    Preparing,
    Prepared,
}

#[derive(Debug)]
pub(crate) struct ClassData<'a> {
    pub node: &'a ClassNode,
    /// Enclosing class of an inner class
    pub owner: Option<ClassId>,
    pub base: Option<BaseClass>,
    pub native_base: String,
    pub state: PrepState,
    /// Instance members, inherited ones first
    pub members: FxHashMap<String, MemberInfo>,
    pub member_count: u32,
    pub static_members: FxHashMap<String, MemberInfo>,
    pub constants: FxHashMap<String, Constant>,
    pub signals: Vec<String>,
    /// Functions declared by this class, synthesized accessors included
    pub functions: FxHashSet<String>,
    pub subclasses: Vec<ClassId>,
}

/// One step of a base-chain walk
#[derive(Debug, Clone, Copy)]
pub(crate) enum ClassRef<'t> {
    Local(&'t ClassData<'t>),
    Compiled(&'t CompiledClass),
}

impl<'t> ClassRef<'t> {
    pub fn static_member(self, name: &str) -> Option<&'t MemberInfo> {
        match self {
            ClassRef::Local(data) => data.static_members.get(name),
            ClassRef::Compiled(class) => class.static_members.get(name),
        }
    }

    pub fn constant(self, name: &str) -> Option<&'t Constant> {
        match self {
            ClassRef::Local(data) => data.constants.get(name),
            ClassRef::Compiled(class) => class.constants.get(name),
        }
    }

    /// Function or signal declared directly by this class
    pub fn has_callable(self, name: &str) -> bool {
        match self {
            ClassRef::Local(data) => data.functions.contains(name) || data.signals.iter().any(|s| s == name),
            ClassRef::Compiled(class) => {
                class.functions.contains_key(name) || class.signals.iter().any(|s| s == name)
            }
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct ClassTable<'a> {
    classes: Vec<ClassData<'a>>,
    by_path: FxHashMap<String, ClassId>,
}

impl<'a> ClassTable<'a> {
    /// Register a root class and, recursively, its inner classes
    pub fn build(root: &'a ClassNode) -> Self {
        let mut table = Self::default();
        table.register(root, None);
        table
    }

    fn register(&mut self, node: &'a ClassNode, owner: Option<ClassId>) -> ClassId {
        let id = ClassId(self.classes.len());
        self.classes.push(ClassData {
            node,
            owner,
            base: None,
            native_base: DEFAULT_BASE.to_string(),
            state: PrepState::Unprepared,
            members: FxHashMap::default(),
            member_count: 0,
            static_members: FxHashMap::default(),
            constants: FxHashMap::default(),
            signals: Vec::new(),
            functions: FxHashSet::default(),
            subclasses: Vec::new(),
        });
        self.by_path.insert(node.path.clone(), id);
        for inner in node.inner_classes() {
            let inner_id = self.register(inner, Some(id));
            self.classes[id.0].subclasses.push(inner_id);
        }
        id
    }

    pub fn ids(&self) -> impl Iterator<Item = ClassId> {
        (0..self.classes.len()).map(ClassId)
    }

    pub fn get(&self, id: ClassId) -> &ClassData<'a> {
        &self.classes[id.0]
    }

    fn get_mut(&mut self, id: ClassId) -> &mut ClassData<'a> {
        &mut self.classes[id.0]
    }

    pub fn find(&self, path: &str) -> Option<ClassId> {
        self.by_path.get(path).copied()
    }

    /// The class and its bases, innermost first
    pub fn lineage(&self, id: ClassId) -> Vec<ClassRef<'_>> {
        let mut out = Vec::new();
        let mut current = Some(ClassRef::Local(self.get(id)));
        while let Some(class) = current {
            out.push(class);
            current = match class {
                ClassRef::Local(data) => match &data.base {
                    Some(BaseClass::Local(base)) => Some(ClassRef::Local(self.get(*base))),
                    Some(BaseClass::Compiled(base)) => Some(ClassRef::Compiled(base)),
                    _ => None,
                },
                ClassRef::Compiled(class) => class.base.as_deref().map(ClassRef::Compiled),
            };
        }
        out
    }

    /// The class and its enclosing classes, innermost first
    pub fn owners(&self, id: ClassId) -> Vec<ClassId> {
        std::iter::successors(Some(id), |c| self.get(*c).owner).collect()
    }

    /// Class constant visible from `id`: enclosing classes outward, each through
    /// its base chain and then its native base
    pub fn constant(&self, id: ClassId, name: &str, registry: &dyn NativeRegistry) -> Option<Constant> {
        for owner in self.owners(id) {
            if let Some(value) = self.lineage(owner).into_iter().find_map(|c| c.constant(name)) {
                return Some(value.clone());
            }
            let native = &self.get(owner).native_base;
            if let Some(value) = registry.integer_constant_in_hierarchy(native, name) {
                return Some(Constant::Int(value));
            }
        }
        None
    }

    /// Static member visible from `id`, searched like constants
    pub fn static_member(&self, id: ClassId, name: &str) -> Option<MemberInfo> {
        self.owners(id)
            .into_iter()
            .find_map(|owner| self.lineage(owner).into_iter().find_map(|c| c.static_member(name)).cloned())
    }

    /// Class whose hierarchy declares function or signal `name`
    pub fn callable_owner(&self, id: ClassId, name: &str) -> Option<ClassId> {
        self.owners(id)
            .into_iter()
            .find(|owner| self.lineage(*owner).into_iter().any(|c| c.has_callable(name)))
    }
}

#[derive(Debug, Default)]
struct ClassFunctions {
    functions: FxHashMap<String, Arc<FunctionDescriptor>>,
    implicit_new: Option<Arc<FunctionDescriptor>>,
    implicit_ready: Option<Arc<FunctionDescriptor>>,
    static_initializer: Option<Arc<FunctionDescriptor>>,
}

/// Compiles one script: prepare every class, compile every body, publish
pub(crate) struct ScriptCompiler<'a> {
    compiler: &'a Compiler,
    root: &'a ClassNode,
    table: ClassTable<'a>,
}

impl<'a> ScriptCompiler<'a> {
    pub fn new(compiler: &'a Compiler, root: &'a ClassNode) -> Self {
        Self {
            compiler,
            root,
            table: ClassTable::build(root),
        }
    }

    pub fn run(mut self, errors: &mut FirstError) -> CompileResult<Arc<CompiledScript>> {
        let ids: Vec<ClassId> = self.table.ids().collect();
        for id in &ids {
            if let Err(error) = self.prepare(*id) {
                errors.report(error.clone());
                return Err(error);
            }
        }

        let ctx = CompileContext {
            registry: self.compiler.registry(),
            globals: self.compiler.globals(),
            backend: self.compiler.backend(),
            options: self.compiler.options(),
            classes: &self.table,
        };
        let mut compiled = Vec::with_capacity(ids.len());
        for id in &ids {
            match compile_class(&ctx, *id) {
                Ok(functions) => compiled.push(functions),
                Err(error) => {
                    errors.report(error.clone());
                    return Err(error);
                }
            }
        }

        Ok(self.publish(compiled))
    }

    fn prepare(&mut self, id: ClassId) -> CompileResult<()> {
        let node = self.table.get(id).node;
        let pos = Pos::new(node.line, 0);
        match self.table.get(id).state {
            PrepState::Prepared => return Ok(()),
            PrepState::Preparing => {
                return Err(CompileError::CyclicInheritance {
                    name: display_name(node),
                    pos,
                })
            }
            PrepState::Unprepared => {}
        }
        self.table.get_mut(id).state = PrepState::Preparing;
        tracing::debug!(class = %node.path, "preparing class");

        let compiler = self.compiler;
        let registry = compiler.registry();
        if !node.name.is_empty() && registry.class_exists(&node.name) {
            return Err(CompileError::ShadowsNativeClass {
                name: node.name.clone(),
                pos,
            });
        }

        let base = match &node.extends {
            Extends::Default => BaseClass::Native(DEFAULT_BASE.to_string()),
            Extends::Native(name) => {
                if !registry.class_exists(name) {
                    return Err(CompileError::MissingBase { name: name.clone(), pos });
                }
                BaseClass::Native(name.clone())
            }
            Extends::Class(path) => {
                let base = self
                    .table
                    .find(path)
                    .ok_or_else(|| CompileError::MissingBase { name: path.clone(), pos })?;
                self.prepare(base)?;
                BaseClass::Local(base)
            }
            Extends::Script(path) => {
                let script = compiler.dependency(path, pos)?;
                let root = script
                    .root_class()
                    .cloned()
                    .ok_or_else(|| CompileError::MissingBase { name: path.clone(), pos })?;
                BaseClass::Compiled(root)
            }
        };

        let (mut members, mut member_count, native_base) = match &base {
            BaseClass::Native(name) => (FxHashMap::default(), 0, name.clone()),
            BaseClass::Local(base) => {
                let data = self.table.get(*base);
                (data.members.clone(), data.member_count, data.native_base.clone())
            }
            BaseClass::Compiled(class) => (class.members.clone(), class.member_count, class.native_base.clone()),
        };

        let mut static_members = FxHashMap::default();
        let mut constants = FxHashMap::default();
        let mut signals = Vec::new();
        let mut functions = FxHashSet::default();
        let mut static_count = 0u32;

        for member in &node.members {
            match member {
                ClassMember::Variable(var) => {
                    self.check_type(&var.ty, Pos::new(var.line, 0))?;
                    let mut info = MemberInfo {
                        index: 0,
                        getter: var.getter_name(),
                        setter: var.setter_name(),
                        ty: var.ty.clone(),
                        exported: var.exported,
                        owner: node.path.clone(),
                    };
                    if var.is_static {
                        info.index = static_count;
                        static_count += 1;
                        static_members.insert(var.name.clone(), info);
                    } else {
                        info.index = member_count;
                        member_count += 1;
                        members.insert(var.name.clone(), info);
                    }
                    if let Some(Accessor::Inline(_)) = &var.getter {
                        functions.extend(var.getter_name());
                    }
                    if let Some(Accessor::Inline(_)) = &var.setter {
                        functions.extend(var.setter_name());
                    }
                }
                ClassMember::Constant { name, value } => {
                    constants.insert(name.clone(), value.clone());
                }
                ClassMember::Function(function) => {
                    functions.insert(function.name.clone());
                }
                ClassMember::Signal { name, .. } => signals.push(name.clone()),
                ClassMember::Enum { name: Some(name), values } => {
                    let entries = values
                        .iter()
                        .map(|(key, value)| (Constant::String(key.clone()), Constant::Int(*value)))
                        .collect();
                    constants.insert(name.clone(), Constant::Dictionary(entries));
                }
                ClassMember::Enum { name: None, values } => {
                    for (key, value) in values {
                        constants.insert(key.clone(), Constant::Int(*value));
                    }
                }
                ClassMember::Class(inner) => {
                    constants.insert(inner.name.clone(), Constant::ScriptClass(inner.path.clone()));
                }
            }
        }

        let data = self.table.get_mut(id);
        data.base = Some(base);
        data.native_base = native_base;
        data.members = members;
        data.member_count = member_count;
        data.static_members = static_members;
        data.constants = constants;
        data.signals = signals;
        data.functions = functions;
        data.state = PrepState::Prepared;
        Ok(())
    }

    /// Native types named in declarations must exist
    fn check_type(&self, ty: &DataType, pos: Pos) -> CompileResult<()> {
        match ty {
            DataType::Native(name) if !self.compiler.registry().class_exists(name) => {
                Err(CompileError::UnresolvedType { name: name.clone(), pos })
            }
            DataType::Script(path) if path.starts_with(&format!("{}::", self.root.path)) => {
                if self.table.find(path).is_some() {
                    Ok(())
                } else {
                    Err(CompileError::UnresolvedType { name: path.clone(), pos })
                }
            }
            DataType::Builtin { element: Some(element), .. } => self.check_type(element, pos),
            _ => Ok(()),
        }
    }

    fn publish(&self, compiled: Vec<ClassFunctions>) -> Arc<CompiledScript> {
        let mut functions: Vec<Option<ClassFunctions>> = compiled.into_iter().map(Some).collect();
        let mut built: Vec<Option<Arc<CompiledClass>>> = vec![None; functions.len()];
        for id in self.table.ids() {
            self.build_class(id, &mut functions, &mut built);
        }

        let classes = built
            .into_iter()
            .flatten()
            .map(|class| (class.path.clone(), class))
            .collect();
        Arc::new(CompiledScript {
            path: self.root.path.clone(),
            root: self.root.path.clone(),
            classes,
            version: self.compiler.next_version(),
        })
    }

    /// Build a class after its local base so the base can be linked
    fn build_class(
        &self,
        id: ClassId,
        functions: &mut [Option<ClassFunctions>],
        built: &mut [Option<Arc<CompiledClass>>],
    ) -> Option<Arc<CompiledClass>> {
        if let Some(class) = &built[id.0] {
            return Some(class.clone());
        }
        let data = self.table.get(id);
        let base = match &data.base {
            Some(BaseClass::Local(base)) => self.build_class(*base, functions, built),
            Some(BaseClass::Compiled(class)) => Some(class.clone()),
            _ => None,
        };
        let own = functions[id.0].take().unwrap_or_default();
        let class = Arc::new(CompiledClass {
            name: data.node.name.clone(),
            path: data.node.path.clone(),
            base,
            native_base: data.native_base.clone(),
            members: data.members.clone(),
            member_count: data.member_count,
            static_members: data.static_members.clone(),
            constants: data.constants.clone(),
            signals: data.signals.clone(),
            functions: own.functions,
            implicit_new: own.implicit_new,
            implicit_ready: own.implicit_ready,
            static_initializer: own.static_initializer,
            subclasses: data.subclasses.iter().map(|c| self.table.get(*c).node.path.clone()).collect(),
            line: data.node.line,
        });
        built[id.0] = Some(class.clone());
        Some(class)
    }
}

fn display_name(node: &ClassNode) -> String {
    if node.name.is_empty() {
        node.path.clone()
    } else {
        node.name.clone()
    }
}

/// Compile every function of a prepared class
fn compile_class(ctx: &CompileContext<'_>, id: ClassId) -> CompileResult<ClassFunctions> {
    let node = ctx.classes.get(id).node;
    let _span = tracing::debug_span!("class", path = %node.path).entered();
    let mut out = ClassFunctions::default();

    for function in node.functions() {
        let descriptor = FunctionCompiler::new(ctx, id, &function.name, function.is_static).compile(function)?;
        out.functions.insert(function.name.clone(), descriptor);
    }

    for var in node.variables() {
        if let (Some(Accessor::Inline(getter)), Some(name)) = (&var.getter, var.getter_name()) {
            let descriptor = FunctionCompiler::new(ctx, id, &name, var.is_static).compile(getter)?;
            out.functions.insert(name, descriptor);
        }
        if let (Some(Accessor::Inline(setter)), Some(name)) = (&var.setter, var.setter_name()) {
            let descriptor = FunctionCompiler::new(ctx, id, &name, var.is_static).compile(setter)?;
            out.functions.insert(name, descriptor);
        }
    }

    out.implicit_new = Some(FunctionCompiler::new(ctx, id, "@implicit_new", false).compile_initializer(false)?);
    if node.variables().any(|v| v.onready && !v.is_static) {
        out.implicit_ready = Some(FunctionCompiler::new(ctx, id, "@implicit_ready", false).compile_initializer(true)?);
    }
    if node.variables().any(|v| v.is_static) {
        out.static_initializer =
            Some(FunctionCompiler::new(ctx, id, "@static_initializer", true).compile_static_initializer()?);
    }
    Ok(out)
}
