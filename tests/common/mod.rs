//! Builder for small but well-formed DEX files
//!
//! Everything is described symbolically (descriptors and names), then laid out in one go: id
//! tables are sorted the way real DEX files sort them, so the binary searches in the library
//! work, and every value is encoded at its minimal width.

#![allow(dead_code)]

use dexannot::dex::{FieldIndex, MethodIndex, TypeIndex};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

pub const BUILD: u8 = 0;
pub const RUNTIME: u8 = 1;
pub const SYSTEM: u8 = 2;

pub const ACC_PUBLIC: u32 = 0x0001;
pub const ACC_STATIC: u32 = 0x0008;
pub const ACC_NATIVE: u32 = 0x0100;
pub const ACC_INTERFACE: u32 = 0x0200;
pub const ACC_ABSTRACT: u32 = 0x0400;
pub const ACC_ANNOTATION: u32 = 0x2000;

const NO_INDEX: u32 = 0xffff_ffff;

/// Field reference: declaring class, name, type
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct FieldRef {
    pub class: String,
    pub name: String,
    pub typ: String,
}

pub fn field_ref(class: &str, name: &str, typ: &str) -> FieldRef {
    FieldRef {
        class: class.to_owned(),
        name: name.to_owned(),
        typ: typ.to_owned(),
    }
}

/// Method reference: declaring class, name, method descriptor (eg. `(I)V`)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct MethodRef {
    pub class: String,
    pub name: String,
    pub descriptor: String,
}

pub fn method_ref(class: &str, name: &str, descriptor: &str) -> MethodRef {
    MethodRef {
        class: class.to_owned(),
        name: name.to_owned(),
        descriptor: descriptor.to_owned(),
    }
}

/// Symbolic encoded value
#[derive(Clone, Debug)]
pub enum Val {
    Byte(i8),
    Short(i16),
    Char(u16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    Null,
    String(String),
    Type(String),
    Field(FieldRef),
    Method(MethodRef),
    Enum(FieldRef),
    Array(Vec<Val>),
    Annotation(Ann),
}

pub fn string(value: &str) -> Val {
    Val::String(value.to_owned())
}

pub fn typ(descriptor: &str) -> Val {
    Val::Type(descriptor.to_owned())
}

pub fn array(values: Vec<Val>) -> Val {
    Val::Array(values)
}

/// Symbolic encoded annotation
#[derive(Clone, Debug)]
pub struct Ann {
    pub descriptor: String,
    pub elements: Vec<(String, Val)>,
}

pub fn ann(descriptor: &str, elements: Vec<(&str, Val)>) -> Ann {
    Ann {
        descriptor: descriptor.to_owned(),
        elements: elements
            .into_iter()
            .map(|(name, value)| (name.to_owned(), value))
            .collect(),
    }
}

/// Annotation item: visibility and annotation
#[derive(Clone, Debug)]
pub struct Item {
    pub visibility: u8,
    pub annotation: Ann,
}

pub fn item(visibility: u8, descriptor: &str, elements: Vec<(&str, Val)>) -> Item {
    Item {
        visibility,
        annotation: ann(descriptor, elements),
    }
}

/// Instruction referring to a field or method (or raw code units)
#[derive(Clone, Debug)]
pub enum Insn {
    Raw(Vec<u16>),

    /// `iget*`/`iput*` (format 22c) or `sget*`/`sput*` (format 21c)
    Field(u8, FieldRef),

    /// `invoke-*` (format 35c, no arguments) or `invoke-*/range` (format 3rc)
    Invoke(u8, MethodRef),
}

pub fn return_void() -> Insn {
    Insn::Raw(vec![0x000e])
}

#[derive(Clone, Debug)]
pub struct FieldSpec {
    pub name: String,
    pub typ: String,
    pub access_flags: u32,
    pub annotations: Vec<Item>,
}

impl FieldSpec {
    pub fn annotate(&mut self, item: Item) -> &mut FieldSpec {
        self.annotations.push(item);
        self
    }
}

#[derive(Clone, Debug)]
pub struct MethodSpec {
    pub name: String,
    pub descriptor: String,
    pub access_flags: u32,
    pub annotations: Vec<Item>,
    pub parameter_annotations: Option<Vec<Vec<Item>>>,
    pub code: Option<Vec<Insn>>,
}

impl MethodSpec {
    pub fn annotate(&mut self, item: Item) -> &mut MethodSpec {
        self.annotations.push(item);
        self
    }

    pub fn annotate_parameters(&mut self, parameters: Vec<Vec<Item>>) -> &mut MethodSpec {
        self.parameter_annotations = Some(parameters);
        self
    }

    pub fn code(&mut self, code: Vec<Insn>) -> &mut MethodSpec {
        self.code = Some(code);
        self
    }

    pub fn access(&mut self, access_flags: u32) -> &mut MethodSpec {
        self.access_flags = access_flags;
        self
    }
}

#[derive(Clone, Debug)]
pub struct ClassSpec {
    pub descriptor: String,
    pub superclass: Option<String>,
    pub access_flags: u32,
    pub annotations: Vec<Item>,
    pub fields: Vec<FieldSpec>,
    pub methods: Vec<MethodSpec>,
    pub static_values: Option<Vec<Val>>,
}

impl ClassSpec {
    pub fn annotate(&mut self, item: Item) -> &mut ClassSpec {
        self.annotations.push(item);
        self
    }

    pub fn field(&mut self, name: &str, typ: &str) -> &mut FieldSpec {
        self.fields.push(FieldSpec {
            name: name.to_owned(),
            typ: typ.to_owned(),
            access_flags: ACC_PUBLIC,
            annotations: vec![],
        });
        self.fields.last_mut().unwrap()
    }

    pub fn static_field(&mut self, name: &str, typ: &str) -> &mut FieldSpec {
        let field = self.field(name, typ);
        field.access_flags |= ACC_STATIC;
        field
    }

    pub fn method(&mut self, name: &str, descriptor: &str) -> &mut MethodSpec {
        self.methods.push(MethodSpec {
            name: name.to_owned(),
            descriptor: descriptor.to_owned(),
            access_flags: ACC_PUBLIC,
            annotations: vec![],
            parameter_annotations: None,
            code: None,
        });
        self.methods.last_mut().unwrap()
    }

    pub fn access(&mut self, access_flags: u32) -> &mut ClassSpec {
        self.access_flags = access_flags;
        self
    }

    pub fn static_values(&mut self, values: Vec<Val>) -> &mut ClassSpec {
        self.static_values = Some(values);
        self
    }
}

#[derive(Default)]
pub struct DexBuilder {
    classes: Vec<ClassSpec>,
    extra_strings: Vec<String>,
}

/// The built file, plus the indices the builder assigned
pub struct BuiltDex {
    pub bytes: Vec<u8>,
    pools: Pools,
}

impl BuiltDex {
    pub fn type_index(&self, descriptor: &str) -> TypeIndex {
        TypeIndex(self.pools.type_index(descriptor))
    }

    pub fn field(&self, class: &str, name: &str) -> FieldIndex {
        let index = self
            .pools
            .fields
            .iter()
            .position(|field| field.class == class && field.name == name)
            .unwrap();
        FieldIndex(index as u32)
    }

    pub fn method(&self, class: &str, name: &str) -> MethodIndex {
        let index = self
            .pools
            .methods
            .iter()
            .position(|method| method.class == class && method.name == name)
            .unwrap();
        MethodIndex(index as u32)
    }
}

/// Split `(IJ[Ljava/lang/String;)V` into return type and parameter types
fn parse_method_descriptor(descriptor: &str) -> Proto {
    let inner = descriptor.strip_prefix('(').unwrap();
    let (params, ret) = inner.split_once(')').unwrap();
    let mut parameters = vec![];
    let mut chars = params.chars();
    let mut current = String::new();
    while let Some(c) = chars.next() {
        current.push(c);
        match c {
            '[' => continue,
            'L' => {
                for c in chars.by_ref() {
                    current.push(c);
                    if c == ';' {
                        break;
                    }
                }
            }
            _ => (),
        }
        parameters.push(std::mem::take(&mut current));
    }
    (ret.to_owned(), parameters)
}

fn shorty(parameters: &[String], ret: &str) -> String {
    let short = |typ: &str| match typ.chars().next().unwrap() {
        '[' | 'L' => 'L',
        c => c,
    };
    let mut shorty = String::new();
    shorty.push(short(ret));
    for parameter in parameters {
        shorty.push(short(parameter));
    }
    shorty
}

/// Return type and parameter types
type Proto = (String, Vec<String>);

/// String table order: by UTF-16 code unit
fn utf16_order(left: &str, right: &str) -> Ordering {
    left.encode_utf16().cmp(right.encode_utf16())
}

/// Modified UTF-8: `U+0000` takes two bytes and supplementary characters become surrogate pairs
fn mutf8(string: &str) -> Vec<u8> {
    let mut out = vec![];
    for unit in string.encode_utf16() {
        match unit {
            0x0001..=0x007f => out.push(unit as u8),
            0x0000 | 0x0080..=0x07ff => {
                out.push(0xc0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
            _ => {
                out.push(0xe0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3f) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
        }
    }
    out
}

#[derive(Default)]
struct Pools {
    strings: Vec<String>,
    types: Vec<String>,
    protos: Vec<Proto>,
    fields: Vec<FieldRef>,
    methods: Vec<MethodRef>,
    method_protos: Vec<Proto>,
}

impl Pools {
    fn string_index(&self, string: &str) -> u32 {
        self.strings.binary_search_by(|s| utf16_order(s, string)).unwrap() as u32
    }

    fn type_index(&self, descriptor: &str) -> u32 {
        self.types.binary_search_by(|s| utf16_order(s, descriptor)).unwrap() as u32
    }

    fn proto_index(&self, proto: &Proto) -> u32 {
        self.protos.binary_search(proto).unwrap() as u32
    }

    fn field_index(&self, field: &FieldRef) -> u32 {
        self.fields.binary_search(field).unwrap() as u32
    }

    fn method_index(&self, method: &MethodRef) -> u32 {
        let proto = parse_method_descriptor(&method.descriptor);
        let key = (&method.class, &method.name, &proto);
        self.methods
            .iter()
            .zip(self.method_protos.iter())
            .position(|(m, p)| (&m.class, &m.name, p) == key)
            .unwrap() as u32
    }
}

#[derive(Default)]
struct Collector {
    strings: BTreeSet<String>,
    types: BTreeSet<String>,
    protos: BTreeSet<Proto>,
    fields: BTreeSet<FieldRef>,
    methods: BTreeMap<(String, String, Proto), MethodRef>,
}

impl Collector {
    fn typ(&mut self, descriptor: &str) {
        self.strings.insert(descriptor.to_owned());
        self.types.insert(descriptor.to_owned());
    }

    fn proto(&mut self, descriptor: &str) -> Proto {
        let proto = parse_method_descriptor(descriptor);
        let (ret, parameters) = &proto;
        self.typ(ret);
        for parameter in parameters {
            self.typ(parameter);
        }
        self.strings.insert(shorty(parameters, ret));
        self.protos.insert(proto.clone());
        proto
    }

    fn field(&mut self, field: &FieldRef) {
        self.typ(&field.class);
        self.typ(&field.typ);
        self.strings.insert(field.name.clone());
        self.fields.insert(field.clone());
    }

    fn method(&mut self, method: &MethodRef) {
        self.typ(&method.class);
        self.strings.insert(method.name.clone());
        let proto = self.proto(&method.descriptor);
        self.methods.insert(
            (method.class.clone(), method.name.clone(), proto),
            method.clone(),
        );
    }

    fn value(&mut self, value: &Val) {
        match value {
            Val::String(string) => {
                self.strings.insert(string.clone());
            }
            Val::Type(descriptor) => self.typ(descriptor),
            Val::Field(field) | Val::Enum(field) => self.field(field),
            Val::Method(method) => self.method(method),
            Val::Array(values) => values.iter().for_each(|value| self.value(value)),
            Val::Annotation(annotation) => self.annotation(annotation),
            _ => (),
        }
    }

    fn annotation(&mut self, annotation: &Ann) {
        self.typ(&annotation.descriptor);
        for (name, value) in &annotation.elements {
            self.strings.insert(name.clone());
            self.value(value);
        }
    }

    fn items(&mut self, items: &[Item]) {
        items.iter().for_each(|item| self.annotation(&item.annotation));
    }

    fn insns(&mut self, code: &[Insn]) {
        for insn in code {
            match insn {
                Insn::Raw(_) => (),
                Insn::Field(_, field) => self.field(field),
                Insn::Invoke(_, method) => self.method(method),
            }
        }
    }

    fn finish(self) -> Pools {
        // Keys sort the way method ids do: by class, name, then prototype
        let methods: Vec<((String, String, Proto), MethodRef)> = self.methods.into_iter().collect();
        let mut strings: Vec<String> = self.strings.into_iter().collect();
        strings.sort_by(|a, b| utf16_order(a, b));
        let mut types: Vec<String> = self.types.into_iter().collect();
        types.sort_by(|a, b| utf16_order(a, b));
        Pools {
            strings,
            types,
            protos: self.protos.into_iter().collect(),
            fields: self.fields.into_iter().collect(),
            method_protos: methods.iter().map(|((_, _, proto), _)| proto.clone()).collect(),
            methods: methods.into_iter().map(|(_, method)| method).collect(),
        }
    }
}

fn uleb128(out: &mut Vec<u8>, mut value: u32) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn align4(out: &mut Vec<u8>) {
    while out.len() % 4 != 0 {
        out.push(0);
    }
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Smallest number of bytes that sign-extend back to `value`
fn signed_width(value: i64) -> usize {
    (1..8)
        .find(|n| {
            let shift = 64 - 8 * n;
            (value << shift) >> shift == value
        })
        .unwrap_or(8)
}

/// Smallest number of bytes that zero-extend back to `value`
fn unsigned_width(value: u64) -> usize {
    (1..8).find(|n| value >> (8 * n) == 0).unwrap_or(8)
}

fn put_tagged(out: &mut Vec<u8>, value_type: u8, bytes: &[u8]) {
    out.push(value_type | (((bytes.len() - 1) as u8) << 5));
    out.extend_from_slice(bytes);
}

fn put_signed(out: &mut Vec<u8>, value_type: u8, value: i64) {
    let width = signed_width(value);
    put_tagged(out, value_type, &value.to_le_bytes()[..width]);
}

fn put_unsigned(out: &mut Vec<u8>, value_type: u8, value: u64) {
    let width = unsigned_width(value);
    put_tagged(out, value_type, &value.to_le_bytes()[..width]);
}

/// Floating point values keep their high-order bytes (trailing zero bytes are dropped)
fn put_float_bits(out: &mut Vec<u8>, value_type: u8, bytes: &[u8]) {
    let zeros = bytes.iter().take_while(|b| **b == 0).count().min(bytes.len() - 1);
    put_tagged(out, value_type, &bytes[zeros..]);
}

struct Writer<'p> {
    pools: &'p Pools,
    data_start: u32,
    data: Vec<u8>,
}

impl<'p> Writer<'p> {
    /// Absolute offset of the next data byte
    fn here(&self) -> u32 {
        self.data_start + self.data.len() as u32
    }

    fn value(&self, out: &mut Vec<u8>, value: &Val) {
        match value {
            Val::Byte(byte) => put_tagged(out, 0x00, &[*byte as u8]),
            Val::Short(short) => put_signed(out, 0x02, *short as i64),
            Val::Char(character) => put_unsigned(out, 0x03, *character as u64),
            Val::Int(int) => put_signed(out, 0x04, *int as i64),
            Val::Long(long) => put_signed(out, 0x06, *long),
            Val::Float(float) => put_float_bits(out, 0x10, &float.to_bits().to_le_bytes()),
            Val::Double(double) => put_float_bits(out, 0x11, &double.to_bits().to_le_bytes()),
            Val::String(string) => put_unsigned(out, 0x17, self.pools.string_index(string) as u64),
            Val::Type(descriptor) => put_unsigned(out, 0x18, self.pools.type_index(descriptor) as u64),
            Val::Field(field) => put_unsigned(out, 0x19, self.pools.field_index(field) as u64),
            Val::Method(method) => put_unsigned(out, 0x1a, self.pools.method_index(method) as u64),
            Val::Enum(field) => put_unsigned(out, 0x1b, self.pools.field_index(field) as u64),
            Val::Array(values) => {
                out.push(0x1c);
                uleb128(out, values.len() as u32);
                for value in values {
                    self.value(out, value);
                }
            }
            Val::Annotation(annotation) => {
                out.push(0x1d);
                self.annotation(out, annotation);
            }
            Val::Null => out.push(0x1e),
            Val::Boolean(boolean) => out.push(0x1f | ((*boolean as u8) << 5)),
        }
    }

    fn annotation(&self, out: &mut Vec<u8>, annotation: &Ann) {
        uleb128(out, self.pools.type_index(&annotation.descriptor));
        let mut elements: Vec<(u32, &Val)> = annotation
            .elements
            .iter()
            .map(|(name, value)| (self.pools.string_index(name), value))
            .collect();
        elements.sort_by_key(|(name, _)| *name);
        uleb128(out, elements.len() as u32);
        for (name, value) in elements {
            uleb128(out, name);
            self.value(out, value);
        }
    }

    /// Write items, then the set pointing at them; returns the offset of the set
    fn annotation_set(&mut self, items: &[Item]) -> u32 {
        let mut offsets = vec![];
        for item in items {
            offsets.push(self.here());
            let mut bytes = vec![item.visibility];
            self.annotation(&mut bytes, &item.annotation);
            self.data.extend(bytes);
        }
        align4(&mut self.data);
        let set_off = self.here();
        put_u32(&mut self.data, offsets.len() as u32);
        for offset in offsets {
            put_u32(&mut self.data, offset);
        }
        set_off
    }

    fn ref_list(&mut self, parameters: &[Vec<Item>]) -> u32 {
        let sets: Vec<u32> = parameters
            .iter()
            .map(|items| if items.is_empty() { 0 } else { self.annotation_set(items) })
            .collect();
        align4(&mut self.data);
        let list_off = self.here();
        put_u32(&mut self.data, sets.len() as u32);
        for set in sets {
            put_u32(&mut self.data, set);
        }
        list_off
    }

    fn code_item(&mut self, code: &[Insn]) -> u32 {
        let mut units: Vec<u16> = vec![];
        for insn in code {
            match insn {
                Insn::Raw(raw) => units.extend(raw),
                Insn::Field(opcode, field) => {
                    units.push(*opcode as u16 | 0x0100);
                    units.push(self.pools.field_index(field) as u16);
                }
                Insn::Invoke(opcode, method) => {
                    units.push(*opcode as u16);
                    units.push(self.pools.method_index(method) as u16);
                    units.push(0);
                }
            }
        }
        align4(&mut self.data);
        let code_off = self.here();
        put_u16(&mut self.data, 4); // registers
        put_u16(&mut self.data, 1); // ins
        put_u16(&mut self.data, 0); // outs
        put_u16(&mut self.data, 0); // tries
        put_u32(&mut self.data, 0); // debug info
        put_u32(&mut self.data, units.len() as u32);
        for unit in units {
            put_u16(&mut self.data, unit);
        }
        code_off
    }
}

impl DexBuilder {
    pub fn new() -> DexBuilder {
        DexBuilder::default()
    }

    /// Class with the given descriptor (created, extending `java/lang/Object`, if new)
    pub fn class(&mut self, descriptor: &str) -> &mut ClassSpec {
        if let Some(index) = self.classes.iter().position(|class| class.descriptor == descriptor) {
            return &mut self.classes[index];
        }
        self.classes.push(ClassSpec {
            descriptor: descriptor.to_owned(),
            superclass: Some(String::from("Ljava/lang/Object;")),
            access_flags: ACC_PUBLIC,
            annotations: vec![],
            fields: vec![],
            methods: vec![],
            static_values: None,
        });
        self.classes.last_mut().unwrap()
    }

    /// Make sure a string is in the string table (eg. an element name only looked up)
    pub fn string(&mut self, string: &str) -> &mut DexBuilder {
        self.extra_strings.push(string.to_owned());
        self
    }

    fn collect(&self) -> Pools {
        let mut collector = Collector::default();
        for string in &self.extra_strings {
            collector.strings.insert(string.clone());
        }
        for class in &self.classes {
            collector.typ(&class.descriptor);
            if let Some(superclass) = &class.superclass {
                collector.typ(superclass);
            }
            collector.items(&class.annotations);
            for field in &class.fields {
                collector.field(&field_ref(&class.descriptor, &field.name, &field.typ));
                collector.items(&field.annotations);
            }
            for method in &class.methods {
                collector.method(&method_ref(&class.descriptor, &method.name, &method.descriptor));
                collector.items(&method.annotations);
                for items in method.parameter_annotations.iter().flatten() {
                    collector.items(items);
                }
                if let Some(code) = &method.code {
                    collector.insns(code);
                }
            }
            for value in class.static_values.iter().flatten() {
                collector.value(value);
            }
        }
        collector.finish()
    }

    pub fn build(&self) -> BuiltDex {
        let pools = self.collect();

        let string_ids_off = 0x70u32;
        let type_ids_off = string_ids_off + 4 * pools.strings.len() as u32;
        let proto_ids_off = type_ids_off + 4 * pools.types.len() as u32;
        let field_ids_off = proto_ids_off + 12 * pools.protos.len() as u32;
        let method_ids_off = field_ids_off + 8 * pools.fields.len() as u32;
        let class_defs_off = method_ids_off + 8 * pools.methods.len() as u32;
        let data_start = class_defs_off + 32 * self.classes.len() as u32;

        let mut writer = Writer {
            pools: &pools,
            data_start,
            data: vec![],
        };

        let mut string_offsets = vec![];
        for string in &pools.strings {
            string_offsets.push(writer.here());
            uleb128(&mut writer.data, string.encode_utf16().count() as u32);
            writer.data.extend_from_slice(&mutf8(string));
            writer.data.push(0);
        }

        let mut proto_parameters = vec![];
        for (_, parameters) in &pools.protos {
            if parameters.is_empty() {
                proto_parameters.push(0);
                continue;
            }
            align4(&mut writer.data);
            proto_parameters.push(writer.here());
            put_u32(&mut writer.data, parameters.len() as u32);
            for parameter in parameters {
                put_u16(&mut writer.data, pools.type_index(parameter) as u16);
            }
        }

        let mut class_defs = vec![];
        for class in &self.classes {
            let mut field_sets = vec![];
            let mut method_sets = vec![];
            let mut parameter_lists = vec![];
            let class_set = if class.annotations.is_empty() {
                0
            } else {
                writer.annotation_set(&class.annotations)
            };
            for field in &class.fields {
                if !field.annotations.is_empty() {
                    let index = pools.field_index(&field_ref(&class.descriptor, &field.name, &field.typ));
                    field_sets.push((index, writer.annotation_set(&field.annotations)));
                }
            }
            for method in &class.methods {
                let index =
                    pools.method_index(&method_ref(&class.descriptor, &method.name, &method.descriptor));
                if !method.annotations.is_empty() {
                    method_sets.push((index, writer.annotation_set(&method.annotations)));
                }
                if let Some(parameters) = &method.parameter_annotations {
                    parameter_lists.push((index, writer.ref_list(parameters)));
                }
            }

            let annotations_off = if class_set == 0
                && field_sets.is_empty()
                && method_sets.is_empty()
                && parameter_lists.is_empty()
            {
                0
            } else {
                field_sets.sort();
                method_sets.sort();
                parameter_lists.sort();
                align4(&mut writer.data);
                let directory_off = writer.here();
                put_u32(&mut writer.data, class_set);
                put_u32(&mut writer.data, field_sets.len() as u32);
                put_u32(&mut writer.data, method_sets.len() as u32);
                put_u32(&mut writer.data, parameter_lists.len() as u32);
                for (index, offset) in field_sets.iter().chain(&method_sets).chain(&parameter_lists) {
                    put_u32(&mut writer.data, *index);
                    put_u32(&mut writer.data, *offset);
                }
                directory_off
            };

            // Code items, then class data
            let mut static_fields = vec![];
            let mut instance_fields = vec![];
            for field in &class.fields {
                let index = pools.field_index(&field_ref(&class.descriptor, &field.name, &field.typ));
                if field.access_flags & ACC_STATIC != 0 {
                    static_fields.push((index, field.access_flags));
                } else {
                    instance_fields.push((index, field.access_flags));
                }
            }
            let mut direct_methods = vec![];
            for method in &class.methods {
                let index =
                    pools.method_index(&method_ref(&class.descriptor, &method.name, &method.descriptor));
                let code_off = match &method.code {
                    None => 0,
                    Some(code) => writer.code_item(code),
                };
                direct_methods.push((index, method.access_flags, code_off));
            }
            static_fields.sort();
            instance_fields.sort();
            direct_methods.sort();

            let class_data_off = if class.fields.is_empty() && class.methods.is_empty() {
                0
            } else {
                let class_data_off = writer.here();
                let data = &mut writer.data;
                uleb128(data, static_fields.len() as u32);
                uleb128(data, instance_fields.len() as u32);
                uleb128(data, direct_methods.len() as u32);
                uleb128(data, 0);
                for fields in [&static_fields, &instance_fields] {
                    let mut previous = 0;
                    for (index, access_flags) in fields.iter() {
                        uleb128(data, index - previous);
                        uleb128(data, *access_flags);
                        previous = *index;
                    }
                }
                let mut previous = 0;
                for (index, access_flags, code_off) in &direct_methods {
                    uleb128(data, index - previous);
                    uleb128(data, *access_flags);
                    uleb128(data, *code_off);
                    previous = *index;
                }
                class_data_off
            };

            let static_values_off = match &class.static_values {
                None => 0,
                Some(values) => {
                    let static_values_off = writer.here();
                    let mut bytes = vec![];
                    uleb128(&mut bytes, values.len() as u32);
                    for value in values {
                        writer.value(&mut bytes, value);
                    }
                    writer.data.extend(bytes);
                    static_values_off
                }
            };

            class_defs.push([
                pools.type_index(&class.descriptor),
                class.access_flags,
                class
                    .superclass
                    .as_ref()
                    .map_or(NO_INDEX, |superclass| pools.type_index(superclass)),
                0,
                NO_INDEX,
                annotations_off,
                class_data_off,
                static_values_off,
            ]);
        }

        let data = writer.data;
        let file_size = data_start + data.len() as u32;

        let mut out = vec![];
        out.extend_from_slice(b"dex\n035\0");
        put_u32(&mut out, 0); // checksum
        out.extend_from_slice(&[0; 20]); // signature
        put_u32(&mut out, file_size);
        put_u32(&mut out, 0x70);
        put_u32(&mut out, 0x1234_5678);
        put_u32(&mut out, 0); // link
        put_u32(&mut out, 0);
        put_u32(&mut out, 0); // map
        for (size, offset) in [
            (pools.strings.len(), string_ids_off),
            (pools.types.len(), type_ids_off),
            (pools.protos.len(), proto_ids_off),
            (pools.fields.len(), field_ids_off),
            (pools.methods.len(), method_ids_off),
            (self.classes.len(), class_defs_off),
            (data.len(), data_start),
        ] {
            put_u32(&mut out, size as u32);
            put_u32(&mut out, if size == 0 { 0 } else { offset });
        }
        assert_eq!(out.len(), 0x70);

        for offset in string_offsets {
            put_u32(&mut out, offset);
        }
        for descriptor in &pools.types {
            put_u32(&mut out, pools.string_index(descriptor));
        }
        for (proto, parameters_off) in pools.protos.iter().zip(proto_parameters) {
            let (ret, parameters) = proto;
            put_u32(&mut out, pools.string_index(&shorty(parameters, ret)));
            put_u32(&mut out, pools.type_index(ret));
            put_u32(&mut out, parameters_off);
        }
        for field in &pools.fields {
            put_u16(&mut out, pools.type_index(&field.class) as u16);
            put_u16(&mut out, pools.type_index(&field.typ) as u16);
            put_u32(&mut out, pools.string_index(&field.name));
        }
        for (method, proto) in pools.methods.iter().zip(&pools.method_protos) {
            put_u16(&mut out, pools.type_index(&method.class) as u16);
            put_u16(&mut out, pools.proto_index(proto) as u16);
            put_u32(&mut out, pools.string_index(&method.name));
        }
        for class_def in class_defs {
            for word in class_def {
                put_u32(&mut out, word);
            }
        }
        assert_eq!(out.len() as u32, data_start);
        out.extend(data);

        BuiltDex { bytes: out, pools }
    }
}
