//! Diagnostic codes reported by the unit compiler.
//!
//! Numbered codes reuse rustc's where the meaning is the same.

/// Function called with the wrong number of arguments.
pub const WRONG_ARG_COUNT: &str = "E0061";
/// Field initialised twice in a struct literal.
pub const FIELD_SPECIFIED_TWICE: &str = "E0062";
/// Struct literal missing fields.
pub const MISSING_FIELDS: &str = "E0063";
/// Field declared twice.
pub const DUPLICATE_FIELD: &str = "E0124";
/// Two associated functions with the same name.
pub const DUPLICATE_DEFINITION: &str = "E0201";
/// Type mismatch.
pub const MISMATCHED_TYPES: &str = "E0308";
/// Binary operator not defined for the operand type.
pub const BINARY_OP: &str = "E0369";
/// Function not a member of the implemented trait.
pub const NOT_A_TRAIT_MEMBER: &str = "E0407";
/// Unknown type name.
pub const UNKNOWN_TYPE: &str = "E0412";
/// Parameter name bound twice.
pub const DUPLICATE_PARAM: &str = "E0415";
/// Unknown value name.
pub const UNKNOWN_VALUE: &str = "E0425";
/// Item defined twice.
pub const DUPLICATE_ITEM: &str = "E0428";
/// Import that does not resolve.
pub const UNRESOLVED_IMPORT: &str = "E0432";
/// Struct literal names a field the struct lacks.
pub const UNKNOWN_FIELD: &str = "E0560";
/// Method or associated function not found.
pub const NO_METHOD: &str = "E0599";
/// Unary operator not defined for the operand type.
pub const UNARY_OP: &str = "E0600";
/// Cast between incompatible types.
pub const INVALID_CAST: &str = "E0605";
/// A unit image on the class path could not be read.
pub const INVALID_UNIT_FILE: &str = "E0786";

pub const SYNTAX: &str = "syntax";
pub const UNSUPPORTED: &str = "unsupported";
pub const INVALID_FLAG: &str = "invalid-flag";
pub const UNIT_NAME_MISMATCH: &str = "unit-name-mismatch";
pub const LITERAL_OUT_OF_RANGE: &str = "literal-out-of-range";
/// Writing an artifact failed.
pub const OUTPUT: &str = "output";

pub const UNUSED_VARIABLES: &str = "unused_variables";
pub const IDENTICAL_CONSTRUCTORS: &str = "identical_constructors";
