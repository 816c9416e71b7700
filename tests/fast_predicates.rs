mod common;

use common::*;
use dexannot::annotations::{fast, Annotations, Target};
use dexannot::dex::{DexFile, NativeMethodFlags};

const FAST_NATIVE: &str = "Ldalvik/annotation/optimization/FastNative;";
const CRITICAL_NATIVE: &str = "Ldalvik/annotation/optimization/CriticalNative;";
const NEVER_COMPILE: &str = "Ldalvik/annotation/optimization/NeverCompile;";
const NEVER_INLINE: &str = "Ldalvik/annotation/optimization/NeverInline;";
const DEAD_REFERENCE_SAFE: &str = "Ldalvik/annotation/optimization/DeadReferenceSafe;";
const REACHABILITY_SENSITIVE: &str = "Ldalvik/annotation/optimization/ReachabilitySensitive;";

#[test]
fn fast_native() {
    let mut builder = DexBuilder::new();
    let class = builder.class("LNatives;");
    class
        .method("fast", "()I")
        .access(ACC_PUBLIC | ACC_NATIVE)
        .annotate(item(BUILD, FAST_NATIVE, vec![]));
    class
        .method("critical", "(I)I")
        .access(ACC_PUBLIC | ACC_STATIC | ACC_NATIVE)
        .annotate(item(BUILD, CRITICAL_NATIVE, vec![]));
    class.method("slow", "()V").access(ACC_PUBLIC | ACC_NATIVE);
    let built = builder.build();
    let dex = DexFile::parse(&built.bytes).unwrap();
    let natives = dex.find_class_def_by_descriptor("LNatives;").unwrap().unwrap();

    let fast_method = built.method("LNatives;", "fast");
    assert_eq!(
        fast::native_method_flags(&dex, &natives, fast_method),
        NativeMethodFlags::FAST_NATIVE
    );
    assert_eq!(
        fast::native_method_flags(&dex, &natives, built.method("LNatives;", "critical")),
        NativeMethodFlags::CRITICAL_NATIVE
    );
    assert!(fast::native_method_flags(&dex, &natives, built.method("LNatives;", "slow")).is_empty());

    // Runtime queries for some other type see nothing
    let annotations = Annotations::new(dex.clone());
    assert!(!annotations
        .is_present(&natives, Target::Method(fast_method), "Ljava/lang/Deprecated;")
        .unwrap());
}

#[test]
fn hints_need_build_visibility() {
    let mut builder = DexBuilder::new();
    let class = builder.class("LFoo;");
    class
        .method("runtime", "()V")
        .annotate(item(RUNTIME, FAST_NATIVE, vec![]))
        .annotate(item(RUNTIME, NEVER_COMPILE, vec![]));
    class
        .method("build", "()V")
        .annotate(item(BUILD, NEVER_COMPILE, vec![]))
        .annotate(item(BUILD, NEVER_INLINE, vec![]));
    let built = builder.build();
    let dex = DexFile::parse(&built.bytes).unwrap();
    let foo = dex.find_class_def_by_descriptor("LFoo;").unwrap().unwrap();

    let runtime = built.method("LFoo;", "runtime");
    assert!(fast::native_method_flags(&dex, &foo, runtime).is_empty());
    assert!(!fast::never_compile(&dex, &foo, runtime));

    let build = built.method("LFoo;", "build");
    assert!(fast::never_compile(&dex, &foo, build));
    assert!(fast::never_inline(&dex, &foo, build));
    assert!(!fast::never_inline(&dex, &foo, runtime));

    let set = fast::method_annotation_set(&dex, &foo, build);
    assert!(fast::never_compile_in(&dex, set.as_ref()));
    assert!(!fast::reachability_sensitive_in(&dex, set.as_ref()));
    assert!(!fast::never_compile_in(&dex, None));
}

#[test]
fn marker_types_missing_from_the_file() {
    let mut builder = DexBuilder::new();
    builder
        .class("LFoo;")
        .annotate(item(RUNTIME, "LT;", vec![]))
        .method("run", "()V")
        .annotate(item(BUILD, "LT;", vec![]));
    let built = builder.build();
    let dex = DexFile::parse(&built.bytes).unwrap();
    let foo = dex.find_class_def_by_descriptor("LFoo;").unwrap().unwrap();
    let run = built.method("LFoo;", "run");

    assert!(fast::native_method_flags(&dex, &foo, run).is_empty());
    assert!(!fast::never_compile(&dex, &foo, run));
    assert!(!fast::method_reachability_sensitive(&dex, &foo, run));
    assert!(!fast::dead_reference_safe(&dex, &foo));
}

#[test]
fn class_and_field_hints() {
    let mut builder = DexBuilder::new();
    let class = builder.class("LResource;");
    class.annotate(item(BUILD, DEAD_REFERENCE_SAFE, vec![]));
    class
        .field("handle", "J")
        .annotate(item(BUILD, REACHABILITY_SENSITIVE, vec![]));
    class.field("name", "Ljava/lang/String;");
    class
        .method("close", "()V")
        .annotate(item(BUILD, REACHABILITY_SENSITIVE, vec![]));
    builder.class("LOther;").annotate(item(RUNTIME, DEAD_REFERENCE_SAFE, vec![]));
    let built = builder.build();
    let dex = DexFile::parse(&built.bytes).unwrap();
    let resource = dex.find_class_def_by_descriptor("LResource;").unwrap().unwrap();
    let other = dex.find_class_def_by_descriptor("LOther;").unwrap().unwrap();

    assert!(fast::dead_reference_safe(&dex, &resource));
    assert!(!fast::dead_reference_safe(&dex, &other));
    assert!(fast::field_reachability_sensitive(
        &dex,
        &resource,
        built.field("LResource;", "handle")
    ));
    assert!(!fast::field_reachability_sensitive(
        &dex,
        &resource,
        built.field("LResource;", "name")
    ));
    assert!(fast::method_reachability_sensitive(
        &dex,
        &resource,
        built.method("LResource;", "close")
    ));
}

#[test]
fn malformed_directory_means_absent() {
    let mut builder = DexBuilder::new();
    builder
        .class("LFoo;")
        .method("run", "()V")
        .annotate(item(BUILD, NEVER_COMPILE, vec![]));
    let built = builder.build();
    let mut bytes = built.bytes.clone();

    // Point the class at a directory past the end of the file
    let dex = DexFile::parse(&bytes).unwrap();
    let foo = dex.find_class_def_by_descriptor("LFoo;").unwrap().unwrap();
    let class_def_off = dex.header().class_defs.offset as usize + 32 * foo.index.0 as usize;
    let bogus = (bytes.len() as u32 + 64).to_le_bytes();
    bytes[class_def_off + 20..class_def_off + 24].copy_from_slice(&bogus);

    let dex = DexFile::parse(&bytes).unwrap();
    let foo = dex.find_class_def_by_descriptor("LFoo;").unwrap().unwrap();
    let run = built.method("LFoo;", "run");
    assert!(!fast::never_compile(&dex, &foo, run));
    assert!(fast::method_annotation_set(&dex, &foo, run).is_none());

    let annotations = Annotations::new(dex.clone());
    assert!(annotations.directory(&foo).is_err());
}
