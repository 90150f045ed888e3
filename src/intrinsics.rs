//! The intrinsic procedure table: which names are intrinsic, the result type
//! of a reference to a generic intrinsic, and the characteristics of the
//! unrestricted specific intrinsics that may be passed as actual arguments.

use std::collections::BTreeMap;

use crate::types::{DynamicType, TypeCategory};

/// Result type of a reference to a generic intrinsic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResultRule {
    SameAsFirst,
    /// Same kind as the first argument, but REAL (as `ABS` of a COMPLEX).
    RealOfFirst,
    Fixed(TypeCategory, u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Elemental,
    /// Scalar result regardless of argument shape.
    Inquiry,
    /// Array argument reduced to a scalar.
    Reduction,
}

#[derive(Debug, Clone, Copy)]
struct GenericIntrinsic {
    result: ResultRule,
    class: Class,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecificDummy {
    pub name: &'static str,
    pub dynamic_type: DynamicType,
}

/// An unrestricted specific intrinsic function (F2018 16.8).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecificIntrinsic {
    pub name: &'static str,
    pub generic: &'static str,
    pub dummies: Vec<SpecificDummy>,
    pub result: DynamicType,
    /// False for inquiry functions such as `LEN`.
    pub elemental: bool,
}

#[derive(Debug, Clone)]
pub struct IntrinsicProcTable {
    generics: BTreeMap<&'static str, GenericIntrinsic>,
    specifics: BTreeMap<&'static str, SpecificIntrinsic>,
}

impl Default for IntrinsicProcTable {
    fn default() -> Self {
        Self::configure()
    }
}

const GENERICS: &[(&str, ResultRule, Class)] = &[
    ("abs", ResultRule::RealOfFirst, Class::Elemental),
    ("acos", ResultRule::SameAsFirst, Class::Elemental),
    ("aimag", ResultRule::RealOfFirst, Class::Elemental),
    ("asin", ResultRule::SameAsFirst, Class::Elemental),
    ("atan", ResultRule::SameAsFirst, Class::Elemental),
    ("atan2", ResultRule::SameAsFirst, Class::Elemental),
    ("conjg", ResultRule::SameAsFirst, Class::Elemental),
    ("cos", ResultRule::SameAsFirst, Class::Elemental),
    ("cosh", ResultRule::SameAsFirst, Class::Elemental),
    ("dble", ResultRule::Fixed(TypeCategory::Real, 8), Class::Elemental),
    ("dim", ResultRule::SameAsFirst, Class::Elemental),
    ("exp", ResultRule::SameAsFirst, Class::Elemental),
    ("index", ResultRule::Fixed(TypeCategory::Integer, 4), Class::Elemental),
    ("int", ResultRule::Fixed(TypeCategory::Integer, 4), Class::Elemental),
    ("len", ResultRule::Fixed(TypeCategory::Integer, 4), Class::Inquiry),
    ("len_trim", ResultRule::Fixed(TypeCategory::Integer, 4), Class::Elemental),
    ("log", ResultRule::SameAsFirst, Class::Elemental),
    ("log10", ResultRule::SameAsFirst, Class::Elemental),
    ("max", ResultRule::SameAsFirst, Class::Elemental),
    ("min", ResultRule::SameAsFirst, Class::Elemental),
    ("mod", ResultRule::SameAsFirst, Class::Elemental),
    ("nint", ResultRule::Fixed(TypeCategory::Integer, 4), Class::Elemental),
    ("real", ResultRule::Fixed(TypeCategory::Real, 4), Class::Elemental),
    ("sign", ResultRule::SameAsFirst, Class::Elemental),
    ("sin", ResultRule::SameAsFirst, Class::Elemental),
    ("sinh", ResultRule::SameAsFirst, Class::Elemental),
    ("sqrt", ResultRule::SameAsFirst, Class::Elemental),
    ("tan", ResultRule::SameAsFirst, Class::Elemental),
    ("tanh", ResultRule::SameAsFirst, Class::Elemental),
    ("allocated", ResultRule::Fixed(TypeCategory::Logical, 4), Class::Inquiry),
    ("associated", ResultRule::Fixed(TypeCategory::Logical, 4), Class::Inquiry),
    ("kind", ResultRule::Fixed(TypeCategory::Integer, 4), Class::Inquiry),
    ("present", ResultRule::Fixed(TypeCategory::Logical, 4), Class::Inquiry),
    ("selected_int_kind", ResultRule::Fixed(TypeCategory::Integer, 4), Class::Inquiry),
    ("selected_real_kind", ResultRule::Fixed(TypeCategory::Integer, 4), Class::Inquiry),
    ("size", ResultRule::Fixed(TypeCategory::Integer, 4), Class::Inquiry),
    ("maxval", ResultRule::SameAsFirst, Class::Reduction),
    ("minval", ResultRule::SameAsFirst, Class::Reduction),
    ("product", ResultRule::SameAsFirst, Class::Reduction),
    ("sum", ResultRule::SameAsFirst, Class::Reduction),
];

// (specific, generic, dummy names, argument type, result type)
const SPECIFICS: &[(&str, &str, &[&str], (TypeCategory, u8), (TypeCategory, u8))] = &[
    ("abs", "abs", &["a"], REAL, REAL),
    ("acos", "acos", &["x"], REAL, REAL),
    ("aimag", "aimag", &["z"], COMPLEX, REAL),
    ("alog", "log", &["x"], REAL, REAL),
    ("alog10", "log10", &["x"], REAL, REAL),
    ("amod", "mod", &["a", "p"], REAL, REAL),
    ("asin", "asin", &["x"], REAL, REAL),
    ("atan", "atan", &["x"], REAL, REAL),
    ("atan2", "atan2", &["y", "x"], REAL, REAL),
    ("cabs", "abs", &["a"], COMPLEX, REAL),
    ("ccos", "cos", &["x"], COMPLEX, COMPLEX),
    ("cexp", "exp", &["x"], COMPLEX, COMPLEX),
    ("clog", "log", &["x"], COMPLEX, COMPLEX),
    ("conjg", "conjg", &["z"], COMPLEX, COMPLEX),
    ("cos", "cos", &["x"], REAL, REAL),
    ("cosh", "cosh", &["x"], REAL, REAL),
    ("csin", "sin", &["x"], COMPLEX, COMPLEX),
    ("csqrt", "sqrt", &["x"], COMPLEX, COMPLEX),
    ("dabs", "abs", &["a"], DOUBLE, DOUBLE),
    ("dacos", "acos", &["x"], DOUBLE, DOUBLE),
    ("dasin", "asin", &["x"], DOUBLE, DOUBLE),
    ("datan", "atan", &["x"], DOUBLE, DOUBLE),
    ("datan2", "atan2", &["y", "x"], DOUBLE, DOUBLE),
    ("dcos", "cos", &["x"], DOUBLE, DOUBLE),
    ("dcosh", "cosh", &["x"], DOUBLE, DOUBLE),
    ("ddim", "dim", &["x", "y"], DOUBLE, DOUBLE),
    ("dexp", "exp", &["x"], DOUBLE, DOUBLE),
    ("dim", "dim", &["x", "y"], REAL, REAL),
    ("dlog", "log", &["x"], DOUBLE, DOUBLE),
    ("dlog10", "log10", &["x"], DOUBLE, DOUBLE),
    ("dmod", "mod", &["a", "p"], DOUBLE, DOUBLE),
    ("dsign", "sign", &["a", "b"], DOUBLE, DOUBLE),
    ("dsin", "sin", &["x"], DOUBLE, DOUBLE),
    ("dsinh", "sinh", &["x"], DOUBLE, DOUBLE),
    ("dsqrt", "sqrt", &["x"], DOUBLE, DOUBLE),
    ("dtan", "tan", &["x"], DOUBLE, DOUBLE),
    ("dtanh", "tanh", &["x"], DOUBLE, DOUBLE),
    ("exp", "exp", &["x"], REAL, REAL),
    ("iabs", "abs", &["a"], INTEGER, INTEGER),
    ("idim", "dim", &["x", "y"], INTEGER, INTEGER),
    ("index", "index", &["string", "substring"], CHARACTER, INTEGER),
    ("isign", "sign", &["a", "b"], INTEGER, INTEGER),
    ("len", "len", &["string"], CHARACTER, INTEGER),
    ("mod", "mod", &["a", "p"], INTEGER, INTEGER),
    ("sign", "sign", &["a", "b"], REAL, REAL),
    ("sin", "sin", &["x"], REAL, REAL),
    ("sinh", "sinh", &["x"], REAL, REAL),
    ("sqrt", "sqrt", &["x"], REAL, REAL),
    ("tan", "tan", &["x"], REAL, REAL),
    ("tanh", "tanh", &["x"], REAL, REAL),
];

const INTEGER: (TypeCategory, u8) = (TypeCategory::Integer, 4);
const REAL: (TypeCategory, u8) = (TypeCategory::Real, 4);
const DOUBLE: (TypeCategory, u8) = (TypeCategory::Real, 8);
const COMPLEX: (TypeCategory, u8) = (TypeCategory::Complex, 4);
const CHARACTER: (TypeCategory, u8) = (TypeCategory::Character, 1);

impl IntrinsicProcTable {
    pub fn configure() -> Self {
        let generics: BTreeMap<_, _> = GENERICS
            .iter()
            .map(|&(name, result, class)| (name, GenericIntrinsic { result, class }))
            .collect();
        let specifics = SPECIFICS
            .iter()
            .map(|&(name, generic, names, (cat, kind), (rcat, rkind))| {
                let dummies = names
                    .iter()
                    .map(|&name| SpecificDummy {
                        name,
                        dynamic_type: DynamicType::intrinsic(cat, kind),
                    })
                    .collect();
                (
                    name,
                    SpecificIntrinsic {
                        name,
                        generic,
                        dummies,
                        result: DynamicType::intrinsic(rcat, rkind),
                        elemental: generics
                            .get(generic)
                            .map_or(true, |g| g.class == Class::Elemental),
                    },
                )
            })
            .collect();
        Self {
            generics,
            specifics,
        }
    }

    pub fn is_intrinsic(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        self.generics.contains_key(name.as_str()) || self.specifics.contains_key(name.as_str())
    }

    /// Only unrestricted specific intrinsics may be passed as actual
    /// arguments or become procedure pointer targets.
    pub fn is_unrestricted_specific(&self, name: &str) -> bool {
        self.specifics
            .contains_key(name.to_ascii_lowercase().as_str())
    }

    pub fn lookup_specific(&self, name: &str) -> Option<&SpecificIntrinsic> {
        self.specifics.get(name.to_ascii_lowercase().as_str())
    }

    pub fn is_elemental(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        match self.generics.get(name.as_str()) {
            Some(generic) => generic.class == Class::Elemental,
            None => self
                .specifics
                .get(name.as_str())
                .map_or(false, |specific| specific.elemental),
        }
    }

    /// True when a reference yields a scalar whatever the arguments' shape.
    pub fn has_scalar_result(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        matches!(
            self.generics.get(name.as_str()).map(|g| g.class),
            Some(Class::Inquiry | Class::Reduction)
        )
    }

    /// The type of a reference to the intrinsic `name` with arguments of the
    /// given types.
    pub fn result_type(&self, name: &str, arguments: &[Option<DynamicType>]) -> Option<DynamicType> {
        let name = name.to_ascii_lowercase();
        if let Some(generic) = self.generics.get(name.as_str()) {
            let first = arguments.first().cloned().flatten();
            return match generic.result {
                ResultRule::Fixed(category, kind) => Some(DynamicType::intrinsic(category, kind)),
                ResultRule::SameAsFirst => first,
                ResultRule::RealOfFirst => first.map(|first| match first.category() {
                    TypeCategory::Complex => DynamicType::real(first.kind()),
                    _ => first,
                }),
            };
        }
        self.specifics
            .get(name.as_str())
            .map(|specific| specific.result.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specific_and_generic_names() {
        let table = IntrinsicProcTable::configure();
        assert!(table.is_unrestricted_specific("DSQRT"));
        assert!(table.is_intrinsic("max"));
        assert!(!table.is_unrestricted_specific("max"));
        assert!(!table.is_intrinsic("foo"));
    }

    #[test]
    fn abs_of_complex_is_real() {
        let table = IntrinsicProcTable::configure();
        let result = table.result_type("abs", &[Some(DynamicType::complex(8))]);
        assert_eq!(result, Some(DynamicType::real(8)));
        let result = table.result_type("iabs", &[Some(DynamicType::integer(4))]);
        assert_eq!(result, Some(DynamicType::integer(4)));
    }

    #[test]
    fn len_is_an_inquiry_specific() {
        let table = IntrinsicProcTable::configure();
        let len = table.lookup_specific("len").expect("len is a specific");
        assert!(!len.elemental);
        assert!(!table.is_elemental("len"));
        assert!(table.lookup_specific("index").expect("index is a specific").elemental);
        assert!(table.lookup_specific("dabs").expect("dabs is a specific").elemental);
    }
}
