//! Classes, fields, methods and whole programs.

use std::{collections::HashMap, sync::Arc};

use bitflags::bitflags;
use rayon::prelude::*;

use crate::ir::{ControlFlowGraph, FieldRef, MethodRef, TypeRef};

bitflags! {
    /// Access flags of classes, fields and methods.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct AccessFlags: u32 {
        /// Visible everywhere.
        const PUBLIC = 0x0001;
        /// Visible only in the declaring class.
        const PRIVATE = 0x0002;
        /// Visible in subclasses.
        const PROTECTED = 0x0004;
        /// No receiver.
        const STATIC = 0x0008;
        /// Cannot be overridden or reassigned.
        const FINAL = 0x0010;
        /// Holds the receiver's monitor while running.
        const SYNCHRONIZED = 0x0020;
        /// Volatile field.
        const VOLATILE = 0x0040;
        /// Implemented outside the program.
        const NATIVE = 0x0100;
        /// Interface class.
        const INTERFACE = 0x0200;
        /// No implementation.
        const ABSTRACT = 0x0400;
        /// Instance or static constructor.
        const CONSTRUCTOR = 0x1_0000;
    }
}

/// The initial value of a static field, stored with the class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EncodedValue {
    /// An integral value.
    Int(i64),
    /// A string constant.
    String(Arc<str>),
    /// The null reference.
    Null,
}

/// A field definition.
#[derive(Clone, Debug)]
pub struct Field {
    /// The field's identity.
    pub reference: FieldRef,
    /// Access flags.
    pub access: AccessFlags,
    /// Encoded initial value of a static field.
    pub static_value: Option<EncodedValue>,
}

impl Field {
    /// Creates a field without an encoded value.
    #[must_use]
    pub fn new(reference: FieldRef, access: AccessFlags) -> Self {
        Self {
            reference,
            access,
            static_value: None,
        }
    }

    /// Returns `true` for static fields.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.access.contains(AccessFlags::STATIC)
    }

    /// Returns `true` for final fields.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.access.contains(AccessFlags::FINAL)
    }
}

/// A method definition.
#[derive(Clone, Debug)]
pub struct Method {
    /// The method's identity.
    pub reference: MethodRef,
    /// Access flags.
    pub access: AccessFlags,
    /// The body; `None` for abstract and native methods.
    pub code: Option<ControlFlowGraph>,
    /// Set when the method must not be optimized.
    pub no_optimizations: bool,
}

impl Method {
    /// Creates a method.
    #[must_use]
    pub fn new(reference: MethodRef, access: AccessFlags, code: Option<ControlFlowGraph>) -> Self {
        Self {
            reference,
            access,
            code,
            no_optimizations: false,
        }
    }

    /// Returns `true` for static methods.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.access.contains(AccessFlags::STATIC)
    }

    /// Returns `true` for methods that hold a monitor while running.
    #[must_use]
    pub fn is_synchronized(&self) -> bool {
        self.access.contains(AccessFlags::SYNCHRONIZED)
    }

    /// Returns `true` if the method can never be overridden.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.access
            .intersects(AccessFlags::FINAL | AccessFlags::PRIVATE | AccessFlags::STATIC)
            || self.reference.is_init()
    }
}

/// A class definition.
#[derive(Clone, Debug)]
pub struct Class {
    /// The class type.
    pub ty: TypeRef,
    /// The superclass; `None` only for the hierarchy root.
    pub super_class: Option<TypeRef>,
    /// Implemented interfaces.
    pub interfaces: Vec<TypeRef>,
    /// Access flags.
    pub access: AccessFlags,
    /// Declared fields.
    pub fields: Vec<Field>,
    /// Declared methods.
    pub methods: Vec<Method>,
}

impl Class {
    /// Creates an empty class deriving from `java.lang.Object`.
    #[must_use]
    pub fn new(ty: TypeRef, access: AccessFlags) -> Self {
        Self {
            ty,
            super_class: Some(TypeRef::java_lang_object()),
            interfaces: Vec::new(),
            access,
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Looks up a declared method.
    #[must_use]
    pub fn method(&self, reference: &MethodRef) -> Option<&Method> {
        self.methods.iter().find(|m| &m.reference == reference)
    }

    /// Looks up a declared method for modification.
    pub fn method_mut(&mut self, reference: &MethodRef) -> Option<&mut Method> {
        self.methods.iter_mut().find(|m| &m.reference == reference)
    }

    /// Looks up a declared field.
    #[must_use]
    pub fn field(&self, reference: &FieldRef) -> Option<&Field> {
        self.fields.iter().find(|f| &f.reference == reference)
    }

    /// Looks up a declared field for modification.
    pub fn field_mut(&mut self, reference: &FieldRef) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| &f.reference == reference)
    }

    /// The static initializer, if any.
    #[must_use]
    pub fn clinit(&self) -> Option<&Method> {
        self.methods.iter().find(|m| m.reference.is_clinit())
    }

    /// The static initializer for modification.
    pub fn clinit_mut(&mut self) -> Option<&mut Method> {
        self.methods.iter_mut().find(|m| m.reference.is_clinit())
    }

    /// Removes the static initializer, returning it.
    pub fn remove_clinit(&mut self) -> Option<Method> {
        let index = self.methods.iter().position(|m| m.reference.is_clinit())?;
        Some(self.methods.remove(index))
    }

    /// Static fields declared by this class.
    pub fn static_fields(&self) -> impl Iterator<Item = &Field> + '_ {
        self.fields.iter().filter(|f| f.is_static())
    }
}

/// A whole program: the scope of interprocedural analyses.
#[derive(Clone, Debug, Default)]
pub struct Program {
    classes: Vec<Class>,
    index: HashMap<TypeRef, usize>,
}

impl Program {
    /// Creates an empty program.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a class, replacing any previous class of the same type.
    pub fn add_class(&mut self, class: Class) {
        match self.index.get(&class.ty) {
            Some(&i) => self.classes[i] = class,
            None => {
                self.index.insert(class.ty.clone(), self.classes.len());
                self.classes.push(class);
            }
        }
    }

    /// Looks up a class by type.
    #[must_use]
    pub fn class(&self, ty: &TypeRef) -> Option<&Class> {
        self.index.get(ty).map(|&i| &self.classes[i])
    }

    /// Looks up a class by type for modification.
    pub fn class_mut(&mut self, ty: &TypeRef) -> Option<&mut Class> {
        self.index.get(ty).map(|&i| &mut self.classes[i])
    }

    /// All classes, in insertion order.
    #[must_use]
    pub fn classes(&self) -> &[Class] {
        &self.classes
    }

    /// All classes for modification.
    pub fn classes_mut(&mut self) -> &mut [Class] {
        &mut self.classes
    }

    /// Looks up a method definition.
    #[must_use]
    pub fn method(&self, reference: &MethodRef) -> Option<&Method> {
        self.class(reference.class())?.method(reference)
    }

    /// Looks up a method definition for modification.
    pub fn method_mut(&mut self, reference: &MethodRef) -> Option<&mut Method> {
        self.class_mut(reference.class())?.method_mut(reference)
    }

    /// Looks up a field definition.
    #[must_use]
    pub fn field(&self, reference: &FieldRef) -> Option<&Field> {
        self.class(reference.class())?.field(reference)
    }

    /// All methods of all classes.
    pub fn methods(&self) -> impl Iterator<Item = &Method> + '_ {
        self.classes.iter().flat_map(|c| c.methods.iter())
    }

    /// All methods of all classes, in parallel.
    pub fn par_methods_mut(&mut self) -> impl ParallelIterator<Item = &mut Method> + '_ {
        self.classes
            .par_iter_mut()
            .flat_map_iter(|c| c.methods.iter_mut())
    }

    /// Resolves a virtual call to the definition a receiver of the reference's
    /// class would dispatch to, walking up the superclass chain.
    #[must_use]
    pub fn resolve_virtual(&self, reference: &MethodRef) -> Option<&Method> {
        let mut current = Some(reference.class().clone());
        while let Some(ty) = current {
            let class = self.class(&ty)?;
            if let Some(method) = class
                .methods
                .iter()
                .find(|m| m.reference.same_signature(reference))
            {
                return Some(method);
            }
            current = class.super_class.clone();
        }
        None
    }

    /// Returns `true` if a class of the program derives from `ty`, directly or
    /// transitively.
    #[must_use]
    pub fn is_subclass(&self, class: &Class, ty: &TypeRef) -> bool {
        let mut current = class.super_class.clone();
        let mut steps = 0;
        while let Some(parent) = current {
            if &parent == ty {
                return true;
            }
            steps += 1;
            if steps > self.classes.len() {
                return false;
            }
            current = self.class(&parent).and_then(|c| c.super_class.clone());
        }
        false
    }

    /// Returns `true` if some subclass of the definition's class overrides it.
    #[must_use]
    pub fn is_overridden(&self, method: &Method) -> bool {
        if method.is_final() {
            return false;
        }
        let owner = method.reference.class();
        self.classes.iter().any(|class| {
            &class.ty != owner
                && self.is_subclass(class, owner)
                && class
                    .methods
                    .iter()
                    .any(|m| m.reference.same_signature(&method.reference))
        })
    }
}
