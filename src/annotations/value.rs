use super::Visibility;
pub use crate::runtime::TypeRef;

/// Fully decoded annotation, owned by the caller
///
/// Type references are resolved or left as descriptors depending on the
/// [`Resolution`](crate::runtime::Resolution) the query ran with.
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation<C> {
    pub annotation_type: TypeRef<C>,
    pub visibility: Visibility,

    /// Elements in increasing order of name index (the order they are stored in)
    pub elements: Vec<(String, Value<C>)>,
}

impl<C> Annotation<C> {
    pub fn element(&self, name: &str) -> Option<&Value<C>> {
        self.elements
            .iter()
            .find(|(element_name, _)| element_name == name)
            .map(|(_, value)| value)
    }
}

/// Field or method reference, as found in an annotation value
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberRef<C> {
    pub declaring_class: TypeRef<C>,
    pub name: String,

    /// Field type descriptor or method descriptor
    pub descriptor: String,
}

/// Fully decoded annotation element value
#[derive(Clone, Debug, PartialEq)]
pub enum Value<C> {
    /// Signed like Java's `byte` (the payload byte is sign-extended, so `0x80` is `-128`)
    Byte(i8),
    Short(i16),
    Char(u16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    String(String),
    Type(TypeRef<C>),
    Field(MemberRef<C>),
    Method(MemberRef<C>),

    /// Enum constant (the static field holding it)
    Enum(MemberRef<C>),

    /// Method descriptor of a `MethodType` constant
    MethodType(String),

    /// Index into `method_handles` (method handles are never materialized)
    MethodHandle(u32),

    Array(Vec<Value<C>>),
    Annotation(Annotation<C>),
    Null,
}

impl<C> Value<C> {
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(int) => Some(*int),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(string) => Some(string),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<&TypeRef<C>> {
        match self {
            Value::Type(type_ref) => Some(type_ref),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value<C>]> {
        match self {
            Value::Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_annotation(&self) -> Option<&Annotation<C>> {
        match self {
            Value::Annotation(annotation) => Some(annotation),
            _ => None,
        }
    }
}
