//! Built-in functions module
//!
//! The universe (names visible in every file) is organised by category:
//! - I/O: print, fail
//! - Utils: type inspection, conversion, attributes
//! - HOF: sorted, min/max, zip and other iteration helpers
//! - Records: container constructors
//!
//! Methods of the built-in types live in `string`, `vector` and `mapping`
//! and are dispatched through `methods`.

pub mod hof;
pub mod io;
pub mod mapping;
pub mod methods;
pub mod records;
pub mod registry;
pub mod string;
pub mod utils;
pub mod vector;

use once_cell::sync::Lazy;

use crate::value::{Env, Value};
use registry::BuiltinRegistry;

static UNIVERSE: Lazy<Env> = Lazy::new(|| create_builtin_registry().into_env());

/// Names predeclared in every guest file
pub fn universe() -> &'static Env {
    &UNIVERSE
}

/// Create and populate the universe registry
pub fn create_builtin_registry() -> BuiltinRegistry {
    let mut registry = BuiltinRegistry::new();

    // ========================================================================
    // Constants
    // ========================================================================

    registry.constant("None", Value::None);
    registry.constant("True", Value::Bool(true));
    registry.constant("False", Value::Bool(false));

    // ========================================================================
    // I/O
    // ========================================================================

    registry.register("print", io::vm_print);
    registry.register("fail", io::vm_fail);

    // ========================================================================
    // Type inspection and conversion
    // ========================================================================

    registry.register("len", utils::vm_len);
    registry.register("str", utils::vm_str);
    registry.register("repr", utils::vm_repr);
    registry.register("int", utils::vm_int);
    registry.register("float", utils::vm_float);
    registry.register("bool", utils::vm_bool);
    registry.register("type", utils::vm_type);
    registry.register("hash", utils::vm_hash);
    registry.register("abs", utils::vm_abs);
    registry.register("hasattr", utils::vm_hasattr);
    registry.register("getattr", utils::vm_getattr);
    registry.register("dir", utils::vm_dir);

    // ========================================================================
    // Containers
    // ========================================================================

    registry.register("list", records::vm_list);
    registry.register("tuple", records::vm_tuple);
    registry.register("dict", records::vm_dict);
    registry.register("set", records::vm_set);
    registry.register("range", records::vm_range);

    // ========================================================================
    // Iteration
    // ========================================================================

    registry.register("sorted", hof::vm_sorted);
    registry.register("reversed", hof::vm_reversed);
    registry.register("enumerate", hof::vm_enumerate);
    registry.register("zip", hof::vm_zip);
    registry.register("min", hof::vm_min);
    registry.register("max", hof::vm_max);
    registry.register("any", hof::vm_any);
    registry.register("all", hof::vm_all);

    registry
}
