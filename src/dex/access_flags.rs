use bitflags::bitflags;

bitflags! {
    /// Access flags on classes
    ///
    /// [0]: https://source.android.com/docs/core/runtime/dex-format#access-flags
    pub struct ClassAccessFlags: u32 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
    }
}

bitflags! {
    /// Access flags on methods
    ///
    /// [0]: https://source.android.com/docs/core/runtime/dex-format#access-flags
    pub struct MethodAccessFlags: u32 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const BRIDGE = 0x0040;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
        const CONSTRUCTOR = 0x10000;
        const DECLARED_SYNCHRONIZED = 0x20000;
    }
}

bitflags! {
    /// Access flags on fields
    ///
    /// [0]: https://source.android.com/docs/core/runtime/dex-format#access-flags
    pub struct FieldAccessFlags: u32 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const VOLATILE = 0x0040;
        const TRANSIENT = 0x0080;
        const SYNTHETIC = 0x1000;
        const ENUM = 0x4000;
    }
}

bitflags! {
    /// Access flags recorded in `dalvik.annotation.InnerClass`
    ///
    /// These are the flags the class was declared with in source, which may differ from the
    /// flags on the class definition itself (eg. a `private` nested class is package-private at
    /// the bytecode level).
    pub struct InnerClassAccessFlags: u32 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
    }
}

bitflags! {
    /// Runtime-only flags a native method picks up from its build-time annotations
    pub struct NativeMethodFlags: u32 {
        /// `@dalvik.annotation.optimization.FastNative`
        const FAST_NATIVE = 0x0008_0000;

        /// `@dalvik.annotation.optimization.CriticalNative`
        const CRITICAL_NATIVE = 0x0020_0000;
    }
}
