use super::FormatError;
use std::fmt::{Debug, Error as FmtError, Formatter};
use std::iter::Peekable;
use std::str::Chars;

/// Utility trait for converting descriptors to and from string representations
pub trait RenderDescriptor {
    /// Turn the descriptor into a string
    fn render(&self) -> String {
        let mut string = String::new();
        self.render_to(&mut string);
        string
    }

    /// Write the descriptor to a string
    fn render_to(&self, write_to: &mut String);
}

pub trait ParseDescriptor: Sized {
    /// Parse a descriptor from a string
    fn parse(source: &str) -> Result<Self, FormatError> {
        let mut chars = source.chars().peekable();
        let ret = Self::parse_from(&mut chars)?;
        match chars.next() {
            None => Ok(ret),
            Some(c) => Err(invalid(format!(
                "Unexpected leftover input '{}' in '{}'",
                c, source
            ))),
        }
    }

    /// Read the descriptor from a character buffer
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self, FormatError>;
}

fn invalid(msg: String) -> FormatError {
    FormatError::InvalidDescriptor(msg)
}

/// Name of a class or interface, in internal form (eg. `java/lang/Object`)
#[derive(Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct BinaryName(String);

impl BinaryName {
    pub fn from_string(name: String) -> Result<BinaryName, FormatError> {
        if name.is_empty() || name.split('/').any(|segment| segment.is_empty()) {
            Err(invalid(format!("Binary name '{}' has an empty segment", name)))
        } else if name.contains(&['.', ';', '['][..]) {
            Err(invalid(format!(
                "Binary name '{}' contains an illegal character",
                name
            )))
        } else {
            Ok(BinaryName(name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name as it appears in Java source (eg. `java.lang.Object`)
    pub fn to_source_name(&self) -> String {
        self.0.replace('/', ".")
    }
}

impl Debug for BinaryName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(&self.0)
    }
}

/// Primitive value types
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

impl RenderDescriptor for BaseType {
    fn render_to(&self, write_to: &mut String) {
        let c = match self {
            BaseType::Byte => 'B',
            BaseType::Char => 'C',
            BaseType::Double => 'D',
            BaseType::Float => 'F',
            BaseType::Int => 'I',
            BaseType::Long => 'J',
            BaseType::Short => 'S',
            BaseType::Boolean => 'Z',
        };
        write_to.push(c);
    }
}

impl ParseDescriptor for BaseType {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self, FormatError> {
        let typ = match source.next() {
            Some('B') => BaseType::Byte,
            Some('C') => BaseType::Char,
            Some('D') => BaseType::Double,
            Some('F') => BaseType::Float,
            Some('I') => BaseType::Int,
            Some('J') => BaseType::Long,
            Some('S') => BaseType::Short,
            Some('Z') => BaseType::Boolean,
            Some(c) => return Err(invalid(format!("Invalid base type character '{}'", c))),
            None => return Err(invalid(String::from("Missing base type character"))),
        };
        Ok(typ)
    }
}

impl RenderDescriptor for BinaryName {
    fn render_to(&self, write_to: &mut String) {
        write_to.push('L');
        write_to.push_str(self.as_str());
        write_to.push(';');
    }
}

impl ParseDescriptor for BinaryName {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self, FormatError> {
        if let Some('L') = source.next() {
            let mut class_name = String::new();
            loop {
                match source.next() {
                    None => {
                        return Err(invalid(format!("Missing terminator for 'L{}'", class_name)))
                    }
                    Some(';') => return BinaryName::from_string(class_name),
                    Some(c) => class_name.push(c),
                }
            }
        } else {
            Err(invalid(String::from(
                "Expected object type to start with `L`",
            )))
        }
    }
}

/// Type of a field, parameter, array element, or annotation element
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum FieldType {
    Base(BaseType),
    Object(BinaryName),
    Array {
        /// Number of `[` (always at least 1)
        dimensions: usize,
        element_type: Box<FieldType>,
    },
}

impl FieldType {
    pub fn is_array(&self) -> bool {
        matches!(self, FieldType::Array { .. })
    }

    pub fn is_object(&self) -> bool {
        matches!(self, FieldType::Object(_))
    }

    /// Element type of an array, with one less dimension
    pub fn component_type(&self) -> Option<FieldType> {
        match self {
            FieldType::Array {
                dimensions: 1,
                element_type,
            } => Some((**element_type).clone()),
            FieldType::Array {
                dimensions,
                element_type,
            } => Some(FieldType::Array {
                dimensions: dimensions - 1,
                element_type: element_type.clone(),
            }),
            _ => None,
        }
    }
}

impl RenderDescriptor for FieldType {
    fn render_to(&self, write_to: &mut String) {
        match self {
            FieldType::Base(base_type) => base_type.render_to(write_to),
            FieldType::Object(class) => class.render_to(write_to),
            FieldType::Array {
                dimensions,
                element_type,
            } => {
                for _ in 0..*dimensions {
                    write_to.push('[');
                }
                element_type.render_to(write_to);
            }
        }
    }
}

impl ParseDescriptor for FieldType {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self, FormatError> {
        match source.peek().copied() {
            None => Err(invalid(String::from("Missing field type"))),
            Some('B' | 'C' | 'D' | 'F' | 'I' | 'J' | 'S' | 'Z') => {
                BaseType::parse_from(source).map(FieldType::Base)
            }
            Some('L') => BinaryName::parse_from(source).map(FieldType::Object),
            Some('[') => {
                let mut dimensions = 0;
                while source.next_if_eq(&'[').is_some() {
                    dimensions += 1;
                }
                if dimensions > 255 {
                    return Err(invalid(format!("Array with {} dimensions", dimensions)));
                }
                let element_type = match FieldType::parse_from(source)? {
                    FieldType::Array { .. } => unreachable!("all `[` were consumed"),
                    other => Box::new(other),
                };
                Ok(FieldType::Array {
                    dimensions,
                    element_type,
                })
            }
            Some(c) => Err(invalid(format!("Invalid field type character '{}'", c))),
        }
    }
}

/// Signature of a method
#[derive(PartialEq, Eq, Hash, Debug, Clone)]
pub struct MethodDescriptor {
    pub parameters: Vec<FieldType>,
    pub return_type: Option<FieldType>, // `None` is for `void` (ie. no return)
}

impl RenderDescriptor for MethodDescriptor {
    fn render_to(&self, write_to: &mut String) {
        write_to.push('(');
        for parameter in &self.parameters {
            parameter.render_to(write_to);
        }
        write_to.push(')');
        match &self.return_type {
            None => write_to.push('V'),
            Some(typ) => typ.render_to(write_to),
        };
    }
}

impl ParseDescriptor for MethodDescriptor {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self, FormatError> {
        if source.next() != Some('(') {
            return Err(invalid(String::from("Expected '(' for method")));
        }

        let mut parameters = vec![];
        while source.peek().copied() != Some(')') {
            parameters.push(FieldType::parse_from(source)?);
        }
        let _ = source.next();

        let return_type = if source.next_if_eq(&'V').is_some() {
            None
        } else {
            Some(FieldType::parse_from(source)?)
        };

        Ok(MethodDescriptor {
            parameters,
            return_type,
        })
    }
}
