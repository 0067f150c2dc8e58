//! Type, field and method references.
//!
//! References use the textual descriptor syntax of register-based bytecode:
//!
//! - types: `I`, `J`, `Ljava/lang/String;`, `[I`
//! - fields: `LFoo;.bar:I`
//! - methods: `LFoo;.baz:(I[JLBar;)V`
//!
//! All three are cheap to clone (reference counted strings) and are ordered and
//! hashable, so they can key maps and sets directly.

use std::{fmt, sync::Arc};

use crate::Result;

/// A type descriptor.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeRef(Arc<str>);

impl TypeRef {
    /// Creates a type reference from a descriptor, validating its syntax.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if `descriptor` is not exactly one type.
    pub fn parse(descriptor: &str) -> Result<Self> {
        let (ty, rest) = split_type(descriptor)?;
        if !rest.is_empty() {
            return Err(malformed_error!("trailing characters in type descriptor '{}'", descriptor));
        }
        Ok(ty)
    }

    /// Returns the descriptor string.
    #[must_use]
    pub fn descriptor(&self) -> &str {
        &self.0
    }

    /// Returns `true` for `long` and `double`, which occupy two registers.
    #[must_use]
    pub fn is_wide(&self) -> bool {
        matches!(&*self.0, "J" | "D")
    }

    /// Returns `true` for class and array types.
    #[must_use]
    pub fn is_object(&self) -> bool {
        self.0.starts_with('L') || self.0.starts_with('[')
    }

    /// Returns `true` for `void`.
    #[must_use]
    pub fn is_void(&self) -> bool {
        &*self.0 == "V"
    }

    /// The root of the class hierarchy.
    #[must_use]
    pub fn java_lang_object() -> Self {
        Self(Arc::from("Ljava/lang/Object;"))
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeRef({})", self.0)
    }
}

/// Splits the first type descriptor off the front of `input`.
fn split_type(input: &str) -> Result<(TypeRef, &str)> {
    let dims = input.bytes().take_while(|&b| b == b'[').count();
    let rest = &input[dims..];
    let len = match rest.as_bytes().first() {
        Some(b'V' | b'Z' | b'B' | b'S' | b'C' | b'I' | b'J' | b'F' | b'D') => 1,
        Some(b'L') => match rest.find(';') {
            Some(end) if end > 1 => end + 1,
            _ => return Err(malformed_error!("unterminated class descriptor '{}'", input)),
        },
        _ => return Err(malformed_error!("invalid type descriptor '{}'", input)),
    };
    if dims > 0 && rest.starts_with('V') {
        return Err(malformed_error!("array of void in '{}'", input));
    }
    let total = dims + len;
    Ok((TypeRef(Arc::from(&input[..total])), &input[total..]))
}

/// Splits `LFoo;.member:rest` into its class and the member text.
fn split_member(descriptor: &str) -> Result<(TypeRef, &str, &str)> {
    let dot = descriptor
        .find(";.")
        .ok_or_else(|| malformed_error!("missing class in member descriptor '{}'", descriptor))?;
    let class = TypeRef::parse(&descriptor[..=dot])?;
    let member = &descriptor[dot + 2..];
    let colon = member
        .find(':')
        .ok_or_else(|| malformed_error!("missing ':' in member descriptor '{}'", descriptor))?;
    if colon == 0 {
        return Err(malformed_error!("empty member name in '{}'", descriptor));
    }
    Ok((class, &member[..colon], &member[colon + 1..]))
}

/// A field reference `LFoo;.bar:I`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldRef {
    class: TypeRef,
    name: Arc<str>,
    ty: TypeRef,
}

impl FieldRef {
    /// Parses a field descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the descriptor is not of the form
    /// `LClass;.name:Type`.
    pub fn parse(descriptor: &str) -> Result<Self> {
        let (class, name, ty) = split_member(descriptor)?;
        Ok(Self {
            class,
            name: Arc::from(name),
            ty: TypeRef::parse(ty)?,
        })
    }

    /// The declaring class.
    #[must_use]
    pub fn class(&self) -> &TypeRef {
        &self.class
    }

    /// The field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The field type.
    #[must_use]
    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}:{}", self.class, self.name, self.ty)
    }
}

impl fmt::Debug for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldRef({self})")
    }
}

/// A method reference `LFoo;.baz:(IJ)V`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MethodRef {
    class: TypeRef,
    name: Arc<str>,
    params: Arc<[TypeRef]>,
    ret: TypeRef,
}

impl MethodRef {
    /// Parses a method descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the descriptor is not of the form
    /// `LClass;.name:(Params)Return`.
    pub fn parse(descriptor: &str) -> Result<Self> {
        let (class, name, proto) = split_member(descriptor)?;
        let mut rest = proto
            .strip_prefix('(')
            .ok_or_else(|| malformed_error!("missing '(' in method descriptor '{}'", descriptor))?;
        let mut params = Vec::new();
        while !rest.starts_with(')') {
            if rest.is_empty() {
                return Err(malformed_error!("unterminated parameter list in '{}'", descriptor));
            }
            let (param, tail) = split_type(rest)?;
            if param.is_void() {
                return Err(malformed_error!("void parameter in '{}'", descriptor));
            }
            params.push(param);
            rest = tail;
        }
        let ret = TypeRef::parse(&rest[1..])?;
        Ok(Self {
            class,
            name: Arc::from(name),
            params: params.into(),
            ret,
        })
    }

    /// The declaring class.
    #[must_use]
    pub fn class(&self) -> &TypeRef {
        &self.class
    }

    /// The method name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared parameter types, excluding the receiver.
    #[must_use]
    pub fn params(&self) -> &[TypeRef] {
        &self.params
    }

    /// The return type.
    #[must_use]
    pub fn return_type(&self) -> &TypeRef {
        &self.ret
    }

    /// Returns `true` for instance constructors.
    #[must_use]
    pub fn is_init(&self) -> bool {
        &*self.name == "<init>"
    }

    /// Returns `true` for static initializers.
    #[must_use]
    pub fn is_clinit(&self) -> bool {
        &*self.name == "<clinit>"
    }

    /// Returns `true` if `other` has the same name and prototype, ignoring the class.
    #[must_use]
    pub fn same_signature(&self, other: &MethodRef) -> bool {
        self.name == other.name && self.params == other.params && self.ret == other.ret
    }

    /// `Ljava/lang/Object;.<init>:()V`, the root instance constructor.
    #[must_use]
    pub fn object_init() -> Self {
        Self {
            class: TypeRef::java_lang_object(),
            name: Arc::from("<init>"),
            params: Arc::from(Vec::new()),
            ret: TypeRef(Arc::from("V")),
        }
    }

    /// Returns this signature declared on a different class.
    #[must_use]
    pub fn with_class(&self, class: TypeRef) -> Self {
        Self {
            class,
            name: self.name.clone(),
            params: self.params.clone(),
            ret: self.ret.clone(),
        }
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}:(", self.class, self.name)?;
        for param in self.params.iter() {
            write!(f, "{param}")?;
        }
        write!(f, "){}", self.ret)
    }
}

impl fmt::Debug for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodRef({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_descriptors() {
        assert!(TypeRef::parse("J").unwrap().is_wide());
        assert!(TypeRef::parse("[[Ljava/lang/String;").unwrap().is_object());
        assert!(TypeRef::parse("Lfoo").is_err());
        assert!(TypeRef::parse("II").is_err());
        assert!(TypeRef::parse("[V").is_err());
    }

    #[test]
    fn test_field_ref() {
        let field = FieldRef::parse("LFoo;.bar:I").unwrap();
        assert_eq!(field.class().descriptor(), "LFoo;");
        assert_eq!(field.name(), "bar");
        assert_eq!(field.ty().descriptor(), "I");
        assert_eq!(field.to_string(), "LFoo;.bar:I");

        assert!(FieldRef::parse("LFoo;bar:I").is_err());
        assert!(FieldRef::parse("LFoo;.:I").is_err());
    }

    #[test]
    fn test_method_ref() {
        let method = MethodRef::parse("LFoo;.baz:(I[JLBar;)V").unwrap();
        assert_eq!(method.name(), "baz");
        assert_eq!(method.params().len(), 3);
        assert!(method.return_type().is_void());
        assert_eq!(
            MethodRef::object_init(),
            MethodRef::parse("Ljava/lang/Object;.<init>:()V").unwrap()
        );
        assert_eq!(method.to_string(), "LFoo;.baz:(I[JLBar;)V");

        let init = MethodRef::parse("Ljava/lang/Object;.<init>:()V").unwrap();
        assert!(init.is_init());
        assert!(init.params().is_empty());

        let moved = method.with_class(TypeRef::parse("LSub;").unwrap());
        assert!(moved.same_signature(&method));
        assert_ne!(moved, method);

        assert!(MethodRef::parse("LFoo;.baz:(I").is_err());
        assert!(MethodRef::parse("LFoo;.baz:I").is_err());
        assert!(MethodRef::parse("LFoo;.baz:(V)V").is_err());
    }
}
