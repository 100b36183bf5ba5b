// Global safety caps and reserved names

/// Upper bound on iterations in any descriptor/name scanning loop, so a
/// malformed constant can never wedge the format checker.
pub const VERIFY_MAX_DESC_ITERS: usize = 200_000;

/// Name of a constructor
pub const CONSTRUCTOR_METHOD_NAME: &str = "<init>";

/// Name of a static initializer
pub const STATIC_INITIALIZER_METHOD_NAME: &str = "<clinit>";

/// Internal name of the class that terminates every superclass walk
pub const OBJECT_CLASS_NAME: &str = "java/lang/Object";
