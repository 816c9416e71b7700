use dexannot::annotations::{
    fast, reachability, AnnotationVisitor, Annotations, Error, Target, Visibility, VisitorErrors,
    VisitorStatus,
};
use dexannot::dex::{ClassDef, DexFile, EncodedValue, FormatError, ValueType};
use dexannot::runtime::{ClassTable, ClassTableArenas, Resolution};

use clap::{Arg, ArgAction, Command};
use std::fs;

fn main() -> Result<(), Error> {
    env_logger::init();

    let matches = Command::new("DEX annotation inspector")
        .version(clap::crate_version!())
        .author("Alec Theriault <alec.theriault@gmail.com>")
        .about("Print the annotations embedded in a DEX file")
        .arg(
            Arg::new("class")
                .long("class")
                .value_name("DESCRIPTOR")
                .help("Only print this class (eg. `Lfoo/Bar;`)"),
        )
        .arg(
            Arg::new("flags")
                .long("flags")
                .action(ArgAction::SetTrue)
                .help("Print the optimization hints of every method"),
        )
        .arg(
            Arg::new("resolve")
                .long("resolve")
                .action(ArgAction::SetTrue)
                .help("Decode class annotations, resolving types against the classes in the file"),
        )
        .arg(
            Arg::new("INPUT")
                .help("Sets the input DEX file to use")
                .required(true)
                .index(1),
        )
        .get_matches();

    let dex_file = matches.get_one::<String>("INPUT").unwrap();
    log::info!("Reading '{}'", &dex_file);
    let dex_bytes = fs::read(dex_file)?;
    let annotations = Annotations::new(DexFile::parse(&dex_bytes)?);
    let dex = annotations.dex();

    let class_table_arenas = ClassTableArenas::new();
    let class_table = ClassTable::new(&class_table_arenas);
    let resolve = matches.get_flag("resolve");
    if resolve {
        class_table.load_dex_classes(dex)?;
    }

    let only_class = matches.get_one::<String>("class");
    for class_def in dex.class_defs() {
        let class_def = class_def?;
        let descriptor = dex.type_descriptor(class_def.class)?;
        if only_class.map_or(false, |only| only.as_str() != descriptor) {
            continue;
        }

        println!("{}", descriptor);
        if resolve {
            let resolution = Resolution::Eager(&class_table);
            for annotation in annotations.get_all(&class_def, Target::Class, &resolution)? {
                println!("  {:?}", annotation);
            }
        } else {
            print_annotations(&annotations, &class_def, Target::Class, 2)?;
        }
        if let Some(signature) = annotations.signature(&class_def, Target::Class)? {
            println!("  signature: {}", signature);
        }
        if let Some(inner_class) = annotations.inner_class(&class_def)? {
            println!(
                "  inner class: {} {:?}",
                inner_class.name.as_deref().unwrap_or("<anonymous>"),
                inner_class.access_flags
            );
        }
        print_members(&annotations, &class_def)?;
        if matches.get_flag("flags") {
            print_flags(dex, &class_def)?;
        }
    }

    Ok(())
}

/// Annotations of every annotated field and method of a class
fn print_members(annotations: &Annotations, class_def: &ClassDef) -> Result<(), Error> {
    let dex = annotations.dex();
    let directory = match annotations.directory(class_def)? {
        None => return Ok(()),
        Some(directory) => directory,
    };
    for entry in directory.field_entries(dex.data()) {
        let (field, _) = entry?;
        println!("  field {}", dex.pretty_field(field)?);
        print_annotations(annotations, class_def, Target::Field(field), 4)?;
    }
    for entry in directory.method_entries(dex.data()) {
        let (method, _) = entry?;
        println!("  method {}", dex.pretty_method(method)?);
        print_annotations(annotations, class_def, Target::Method(method), 4)?;
        if let Some(throws) = annotations.exceptions(class_def, method, &Resolution::descriptors_only())? {
            let throws: Vec<_> = throws.iter().filter_map(|typ| typ.descriptor()).collect();
            println!("    throws: {}", throws.join(", "));
        }
    }
    for entry in directory.parameter_entries(dex.data()) {
        let (method, _) = entry?;
        let count = annotations.annotated_parameter_count(class_def, method)?;
        println!(
            "  method {} has {} annotated parameters",
            dex.pretty_method(method)?,
            count
        );
    }
    Ok(())
}

/// Build-time optimization hints of every method of a class
fn print_flags(dex: &DexFile, class_def: &ClassDef) -> Result<(), Error> {
    let class_data = match dex.class_data(class_def)? {
        None => return Ok(()),
        Some(class_data) => class_data,
    };
    if fast::dead_reference_safe(dex, class_def) {
        println!("  dead reference safe");
    }
    for method in class_data.methods() {
        let set = fast::method_annotation_set(dex, class_def, method.method_index);
        let mut hints = vec![];
        let native_flags = fast::native_method_flags_in(dex, set.as_ref());
        if !native_flags.is_empty() {
            hints.push(format!("{:?}", native_flags));
        }
        if fast::never_compile_in(dex, set.as_ref()) {
            hints.push(String::from("never compile"));
        }
        if fast::never_inline_in(dex, set.as_ref()) {
            hints.push(String::from("never inline"));
        }
        if fast::reachability_sensitive_in(dex, set.as_ref()) {
            hints.push(String::from("reachability sensitive"));
        }
        if reachability::method_contains_reachability_sensitive_access(
            dex,
            class_def,
            method.method_index,
        ) {
            hints.push(String::from("accesses reachability sensitive members"));
        }
        if !hints.is_empty() {
            println!(
                "  {}: {}",
                dex.pretty_method(method.method_index)?,
                hints.join(", ")
            );
        }
    }
    Ok(())
}

fn print_annotations(
    annotations: &Annotations,
    class_def: &ClassDef,
    target: Target,
    indent: usize,
) -> Result<(), Error> {
    let mut printer = Printer::new(annotations.dex(), indent);
    annotations.visit(class_def, target, &mut printer);
    for line in &printer.lines {
        println!("{}", line);
    }
    match printer.errors.take() {
        None => Ok(()),
        Some(err) => Err(Error::Format(err)),
    }
}

/// Renders annotations as they are visited, one line per annotation or value
///
/// Nested annotations are indented under the value line that holds them.
struct Printer<'d, 'a> {
    dex: &'d DexFile<'a>,
    indent: usize,

    /// Indentation of each annotation currently being visited (outermost first)
    open: Vec<usize>,

    /// Indentation of the last value line
    last_value: usize,
    lines: Vec<String>,
    errors: VisitorErrors,
}

impl<'d, 'a> Printer<'d, 'a> {
    fn new(dex: &'d DexFile<'a>, indent: usize) -> Printer<'d, 'a> {
        Printer {
            dex,
            indent,
            open: vec![],
            last_value: indent,
            lines: vec![],
            errors: VisitorErrors::default(),
        }
    }

    fn describe(&self, value: &EncodedValue) -> Result<String, FormatError> {
        let description = match *value {
            EncodedValue::Byte(byte) => byte.to_string(),
            EncodedValue::Short(short) => short.to_string(),
            EncodedValue::Char(character) => format!("{:#06x}", character),
            EncodedValue::Int(int) => int.to_string(),
            EncodedValue::Long(long) => long.to_string(),
            EncodedValue::Float(float) => float.to_string(),
            EncodedValue::Double(double) => double.to_string(),
            EncodedValue::Boolean(boolean) => boolean.to_string(),
            EncodedValue::Null => String::from("null"),
            EncodedValue::String(string) => format!("{:?}", self.dex.string(string)?),
            EncodedValue::Type(type_index) => self.dex.type_descriptor(type_index)?.into_owned(),
            EncodedValue::Field(field) | EncodedValue::Enum(field) => self.dex.pretty_field(field)?,
            EncodedValue::Method(method) => self.dex.pretty_method(method)?,
            EncodedValue::MethodType(proto) => format!("proto@{}", proto.0),
            EncodedValue::MethodHandle(handle) => format!("method_handle@{}", handle),
            EncodedValue::Array(array) => format!("[{} elements]", array.len()),
            EncodedValue::Annotation(annotation) => {
                format!("@{}", self.dex.type_descriptor(annotation.type_index)?)
            }
        };
        Ok(description)
    }

    /// Indentation of the elements of the innermost open annotation
    fn element_indent(&self) -> usize {
        self.open.last().map_or(self.indent, |indent| indent + 2)
    }

    fn print(&mut self, indent: usize, label: &str, value: &EncodedValue) -> VisitorStatus {
        match self.describe(value) {
            Ok(description) => {
                self.lines
                    .push(format!("{:indent$}{} = {}", "", label, description, indent = indent));
                self.last_value = indent;
                VisitorStatus::Inner
            }
            Err(err) => {
                self.errors.record(err);
                VisitorStatus::Break
            }
        }
    }
}

impl<'d, 'a> AnnotationVisitor for Printer<'d, 'a> {
    fn visit_annotation(&mut self, descriptor: &str, visibility: Visibility) -> VisitorStatus {
        let indent = if self.open.is_empty() {
            self.indent
        } else {
            self.last_value + 2
        };
        self.lines.push(format!(
            "{:indent$}@{} ({:?})",
            "",
            descriptor,
            visibility,
            indent = indent
        ));
        self.open.push(indent);
        VisitorStatus::Inner
    }

    fn visit_annotation_element(
        &mut self,
        name: &str,
        _value_type: ValueType,
        value: &EncodedValue,
    ) -> VisitorStatus {
        self.print(self.element_indent(), name, value)
    }

    fn visit_array_element(
        &mut self,
        depth: usize,
        index: usize,
        _value_type: ValueType,
        value: &EncodedValue,
    ) -> VisitorStatus {
        let label = format!("[{}]", index);
        self.print(self.element_indent() + 2 + 2 * depth, &label, value)
    }

    fn leave_annotation(&mut self) {
        self.open.pop();
    }

    fn errors(&mut self) -> &mut VisitorErrors {
        &mut self.errors
    }
}
