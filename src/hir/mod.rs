//! HIR (component I): a zone-owned tree of namespaces, classes, fields,
//! methods, method groups, enums, aliases and imports, plus the object-header
//! layout each class carries. The per-method SSA value graph lives in
//! `value`; the external translator's lowering contract lives in
//! `translator` (component J).

pub mod factory;
pub mod translator;
pub mod value;

pub use value::{Function, HirBlock, HirBlockId, HirOpcode, HirValue, HirValueId};

use crate::zone::{zone_handle, Zone};
use std::collections::HashMap;

/// Authoritative sizes for object allocation: the instance size carried by
/// the heap object's header, and the value size used when it's embedded
/// inline (e.g. a struct field or array element).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TypeLayout {
    pub instance_size: u32,
    pub value_size: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeRef {
    Int,
    Float,
    Bool,
    Void,
    Class(ClassId),
    Array { element: Box<TypeRef>, rank: i32 },
}

zone_handle! { pub struct NamespaceId(Namespace); }
zone_handle! { pub struct ClassId(Class); }
zone_handle! { pub struct FieldId(Field); }
zone_handle! { pub struct MethodId(Method); }
zone_handle! { pub struct EnumId(EnumDef); }
zone_handle! { pub struct AliasId(Alias); }

pub struct Namespace {
    pub name: String,
    pub parent: Option<NamespaceId>,
    pub namespaces: Vec<NamespaceId>,
    pub classes: Vec<ClassId>,
    pub enums: Vec<EnumId>,
    pub aliases: Vec<AliasId>,
    pub imports: Vec<String>,
}

pub struct Class {
    pub name: String,
    pub layout: TypeLayout,
    pub base: Option<ClassId>,
    pub fields: Vec<FieldId>,
    pub methods: Vec<MethodId>,
    /// Overload groups keyed by name, for method-group lookup.
    pub method_groups: HashMap<String, Vec<MethodId>>,
}

pub struct Field {
    pub name: String,
    pub ty: TypeRef,
}

pub struct Method {
    pub name: String,
    pub params: Vec<TypeRef>,
    pub return_ty: TypeRef,
    pub body: Option<Function>,
}

pub struct EnumDef {
    pub name: String,
    pub underlying: TypeRef,
    pub variants: Vec<(String, i64)>,
}

pub struct Alias {
    pub name: String,
    pub target: TypeRef,
}

impl Class {
    /// Walks `base` links collecting the base-class chain, nearest first.
    pub fn base_chain<'a>(&self, classes: &'a Zone<Class>) -> Vec<&'a Class> {
        let mut chain = Vec::new();
        let mut cur = self.base;
        while let Some(id) = cur {
            let c = &classes[id.0];
            chain.push(c);
            cur = c.base;
        }
        chain
    }
}

impl TypeRef {
    pub fn element_type(&self) -> Option<&TypeRef> {
        match self {
            TypeRef::Array { element, .. } => Some(element),
            _ => None,
        }
    }

    pub fn rank(&self) -> Option<i32> {
        match self {
            TypeRef::Array { rank, .. } => Some(*rank),
            _ => None,
        }
    }
}

/// A module-level collection of namespaces the translator (J) populates
/// before handing function bodies to the HIR→LIR factory (K).
#[derive(Default)]
pub struct Module {
    pub namespaces: Zone<Namespace>,
    pub classes: Zone<Class>,
    pub fields: Zone<Field>,
    pub methods: Zone<Method>,
    pub enums: Zone<EnumDef>,
    pub aliases: Zone<Alias>,
}

impl Module {
    pub fn new() -> Self {
        Module {
            namespaces: Zone::new(),
            classes: Zone::new(),
            fields: Zone::new(),
            methods: Zone::new(),
            enums: Zone::new(),
            aliases: Zone::new(),
        }
    }

    pub fn add_namespace(&mut self, name: impl Into<String>, parent: Option<NamespaceId>) -> NamespaceId {
        let id = NamespaceId(self.namespaces.alloc(Namespace {
            name: name.into(),
            parent,
            namespaces: Vec::new(),
            classes: Vec::new(),
            enums: Vec::new(),
            aliases: Vec::new(),
            imports: Vec::new(),
        }));
        if let Some(p) = parent {
            self.namespaces[p.0].namespaces.push(id);
        }
        id
    }

    pub fn add_class(&mut self, ns: NamespaceId, name: impl Into<String>, layout: TypeLayout, base: Option<ClassId>) -> ClassId {
        let id = ClassId(self.classes.alloc(Class {
            name: name.into(),
            layout,
            base,
            fields: Vec::new(),
            methods: Vec::new(),
            method_groups: HashMap::new(),
        }));
        self.namespaces[ns.0].classes.push(id);
        id
    }

    pub fn add_field(&mut self, class: ClassId, name: impl Into<String>, ty: TypeRef) -> FieldId {
        let id = FieldId(self.fields.alloc(Field { name: name.into(), ty }));
        self.classes[class.0].fields.push(id);
        id
    }

    pub fn add_method(&mut self, class: ClassId, name: impl Into<String>, params: Vec<TypeRef>, return_ty: TypeRef) -> MethodId {
        let name = name.into();
        let id = MethodId(self.methods.alloc(Method { name: name.clone(), params, return_ty, body: None }));
        let c = &mut self.classes[class.0];
        c.methods.push(id);
        c.method_groups.entry(name).or_default().push(id);
        id
    }

    pub fn add_enum(&mut self, ns: NamespaceId, name: impl Into<String>, underlying: TypeRef) -> EnumId {
        let id = EnumId(self.enums.alloc(EnumDef { name: name.into(), underlying, variants: Vec::new() }));
        self.namespaces[ns.0].enums.push(id);
        id
    }

    pub fn add_enum_variant(&mut self, e: EnumId, name: impl Into<String>, value: i64) {
        self.enums[e.0].variants.push((name.into(), value));
    }

    pub fn add_alias(&mut self, ns: NamespaceId, name: impl Into<String>, target: TypeRef) -> AliasId {
        let id = AliasId(self.aliases.alloc(Alias { name: name.into(), target }));
        self.namespaces[ns.0].aliases.push(id);
        id
    }

    /// Method-group lookup by name within one class
    pub fn method_group<'a>(&'a self, class: ClassId, name: &str) -> &'a [MethodId] {
        self.classes[class.0].method_groups.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn set_body(&mut self, method: MethodId, body: Function) {
        self.methods[method.0].body = Some(body);
    }
}
