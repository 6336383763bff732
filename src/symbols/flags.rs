//! Attribute flag sets of ECMA-335 definitions and a few engine-level flag sets.
//!
//! # Reference
//! * [ECMA-335 II.23.1](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf) - Flags for various metadata tables

use bitflags::bitflags;

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
    /// `TypeAttributes` (II.23.1.15)
    pub struct TypeAttributes: u32 {
        /// Visible outside the assembly
        const PUBLIC = 0x0000_0001;
        /// Nested type, public visibility
        const NESTED_PUBLIC = 0x0000_0002;
        /// Nested type, private visibility
        const NESTED_PRIVATE = 0x0000_0003;
        /// Nested type, assembly visibility
        const NESTED_ASSEMBLY = 0x0000_0005;
        /// Fields are laid out sequentially
        const SEQUENTIAL_LAYOUT = 0x0000_0008;
        /// Type is an interface
        const INTERFACE = 0x0000_0020;
        /// Type is abstract
        const ABSTRACT = 0x0000_0080;
        /// Type cannot be derived from
        const SEALED = 0x0000_0100;
        /// Name is special
        const SPECIAL_NAME = 0x0000_0400;
        /// Static constructor may run before first static field access
        const BEFORE_FIELD_INIT = 0x0010_0000;
    }
}

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
    /// `FieldAttributes` (II.23.1.5)
    pub struct FieldAttributes: u16 {
        /// Accessible only by the parent type
        const PRIVATE = 0x0001;
        /// Accessible by anyone in the assembly
        const ASSEMBLY = 0x0003;
        /// Accessible by anyone
        const PUBLIC = 0x0006;
        /// Static field
        const STATIC = 0x0010;
        /// Field can only be initialized
        const INIT_ONLY = 0x0020;
        /// Compile time constant
        const LITERAL = 0x0040;
        /// Name is special
        const SPECIAL_NAME = 0x0200;
    }
}

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
    /// `MethodAttributes` (II.23.1.10)
    pub struct MethodAttributes: u16 {
        /// Accessible only by the parent type
        const PRIVATE = 0x0001;
        /// Accessible by anyone in the assembly
        const ASSEMBLY = 0x0003;
        /// Accessible only by the type and sub-types
        const FAMILY = 0x0004;
        /// Accessible by anyone
        const PUBLIC = 0x0006;
        /// Defined on the type rather than per instance
        const STATIC = 0x0010;
        /// Cannot be overridden
        const FINAL = 0x0020;
        /// Virtual method
        const VIRTUAL = 0x0040;
        /// Hide by name and signature
        const HIDE_BY_SIG = 0x0080;
        /// Always gets a new vtable slot
        const NEW_SLOT = 0x0100;
        /// Method has no implementation
        const ABSTRACT = 0x0400;
        /// Name is special
        const SPECIAL_NAME = 0x0800;
        /// Runtime checks the name encoding
        const RT_SPECIAL_NAME = 0x1000;
    }
}

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
    /// `MethodImplAttributes` (II.23.1.11)
    pub struct MethodImplAttributes: u16 {
        /// Implementation is provided by the runtime
        const RUNTIME = 0x0003;
        /// Method cannot be inlined
        const NO_INLINING = 0x0008;
        /// Single-threaded through the body
        const SYNCHRONIZED = 0x0020;
        /// Implemented inside the runtime
        const INTERNAL_CALL = 0x1000;
    }
}

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
    /// `ParamAttributes` (II.23.1.13)
    pub struct ParamAttributes: u16 {
        /// Input parameter
        const IN = 0x0001;
        /// Output parameter
        const OUT = 0x0002;
        /// Optional parameter
        const OPTIONAL = 0x0010;
        /// Parameter has a default value
        const HAS_DEFAULT = 0x1000;
    }
}

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
    /// `PropertyAttributes` (II.23.1.14)
    pub struct PropertyAttributes: u16 {
        /// Name is special
        const SPECIAL_NAME = 0x0200;
        /// Runtime checks the name encoding
        const RT_SPECIAL_NAME = 0x0400;
        /// Property has a default value
        const HAS_DEFAULT = 0x1000;
    }
}

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
    /// `EventAttributes` (II.23.1.4)
    pub struct EventAttributes: u16 {
        /// Name is special
        const SPECIAL_NAME = 0x0200;
        /// Runtime checks the name encoding
        const RT_SPECIAL_NAME = 0x0400;
    }
}

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
    /// `GenericParamAttributes` (II.23.1.7)
    pub struct GenericParamAttributes: u16 {
        /// Covariant type parameter
        const COVARIANT = 0x0001;
        /// Contravariant type parameter
        const CONTRAVARIANT = 0x0002;
        /// Type argument must be a reference type
        const REFERENCE_TYPE_CONSTRAINT = 0x0004;
        /// Type argument must be a non-nullable value type
        const NOT_NULLABLE_VALUE_TYPE_CONSTRAINT = 0x0008;
        /// Type argument must have a public default constructor
        const DEFAULT_CONSTRUCTOR_CONSTRAINT = 0x0010;
    }
}

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
    /// `MethodSemanticsAttributes` (II.23.1.12)
    pub struct MethodSemanticsAttributes: u16 {
        /// Property setter
        const SETTER = 0x0001;
        /// Property getter
        const GETTER = 0x0002;
        /// Other accessor
        const OTHER = 0x0004;
        /// Event add accessor
        const ADD_ON = 0x0008;
        /// Event remove accessor
        const REMOVE_ON = 0x0010;
        /// Event raise accessor
        const FIRE = 0x0020;
    }
}

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, PartialOrd, Ord)]
    /// Constraints recorded for a local variable slot
    pub struct LocalConstraints: u8 {
        /// Pinned local (`ELEMENT_TYPE_PINNED`)
        const PINNED = 0x01;
        /// Managed reference (`ELEMENT_TYPE_BYREF`)
        const BYREF = 0x02;
    }
}

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
    /// Well-known runtime attributes a compilation can reference
    pub struct WellKnownAttributes: u8 {
        /// `System.Runtime.CompilerServices.AsyncStateMachineAttribute`
        const ASYNC_STATE_MACHINE = 0x01;
        /// `System.Runtime.CompilerServices.IteratorStateMachineAttribute`
        const ITERATOR_STATE_MACHINE = 0x02;
        /// `System.Runtime.CompilerServices.AsyncIteratorStateMachineAttribute`
        const ASYNC_ITERATOR_STATE_MACHINE = 0x04;
    }
}
