use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeCategory {
    Integer,
    Real,
    Complex,
    Character,
    Logical,
    Derived,
}

impl TypeCategory {
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            TypeCategory::Integer | TypeCategory::Real | TypeCategory::Complex
        )
    }

    pub fn default_kind(self) -> u8 {
        match self {
            TypeCategory::Integer | TypeCategory::Real | TypeCategory::Complex => 4,
            TypeCategory::Logical => 4,
            TypeCategory::Character => 1,
            TypeCategory::Derived => 0,
        }
    }

    pub fn is_valid_kind(self, kind: i64) -> bool {
        match self {
            TypeCategory::Integer => matches!(kind, 1 | 2 | 4 | 8 | 16),
            TypeCategory::Real | TypeCategory::Complex => matches!(kind, 2 | 4 | 8 | 10 | 16),
            TypeCategory::Character => matches!(kind, 1 | 2 | 4),
            TypeCategory::Logical => matches!(kind, 1 | 2 | 4 | 8),
            TypeCategory::Derived => kind == 0,
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            TypeCategory::Integer => "INTEGER",
            TypeCategory::Real => "REAL",
            TypeCategory::Complex => "COMPLEX",
            TypeCategory::Character => "CHARACTER",
            TypeCategory::Logical => "LOGICAL",
            TypeCategory::Derived => "TYPE",
        }
    }
}

/// A derived type together with the chain of types it extends.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DerivedTypeSpec {
    pub name: String,
    pub parent: Option<Box<DerivedTypeSpec>>,
}

impl DerivedTypeSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: DerivedTypeSpec) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }

    /// True when `self` is `ancestor` or one of its extensions.
    pub fn extends(&self, ancestor: &DerivedTypeSpec) -> bool {
        let mut current = Some(self);
        while let Some(spec) = current {
            if spec.name == ancestor.name {
                return true;
            }
            current = spec.parent.as_deref();
        }
        false
    }
}

/// The type of an entity as it can be known at compile time; character
/// length lives with the entity, not with its type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DynamicType {
    category: TypeCategory,
    kind: u8,
    derived: Option<DerivedTypeSpec>,
    polymorphic: bool,
}

impl DynamicType {
    pub fn intrinsic(category: TypeCategory, kind: u8) -> Self {
        Self {
            category,
            kind,
            derived: None,
            polymorphic: false,
        }
    }

    pub fn default_of(category: TypeCategory) -> Self {
        Self::intrinsic(category, category.default_kind())
    }

    pub fn integer(kind: u8) -> Self {
        Self::intrinsic(TypeCategory::Integer, kind)
    }

    pub fn real(kind: u8) -> Self {
        Self::intrinsic(TypeCategory::Real, kind)
    }

    pub fn complex(kind: u8) -> Self {
        Self::intrinsic(TypeCategory::Complex, kind)
    }

    pub fn character(kind: u8) -> Self {
        Self::intrinsic(TypeCategory::Character, kind)
    }

    pub fn logical(kind: u8) -> Self {
        Self::intrinsic(TypeCategory::Logical, kind)
    }

    /// `TYPE(t)`
    pub fn derived(spec: DerivedTypeSpec) -> Self {
        Self {
            category: TypeCategory::Derived,
            kind: 0,
            derived: Some(spec),
            polymorphic: false,
        }
    }

    /// `CLASS(t)`
    pub fn class(spec: DerivedTypeSpec) -> Self {
        Self {
            polymorphic: true,
            ..Self::derived(spec)
        }
    }

    /// `CLASS(*)`
    pub fn unlimited_polymorphic() -> Self {
        Self {
            category: TypeCategory::Derived,
            kind: 0,
            derived: None,
            polymorphic: true,
        }
    }

    /// `TYPE(*)`
    pub fn assumed_type() -> Self {
        Self {
            category: TypeCategory::Derived,
            kind: 0,
            derived: None,
            polymorphic: false,
        }
    }

    /// Stands in for a BOZ literal passed to an intrinsic that accepts
    /// typeless arguments; such a value has no real type of its own.
    pub fn typeless_intrinsic_argument() -> Self {
        Self::intrinsic(TypeCategory::Integer, 0)
    }

    pub fn category(&self) -> TypeCategory {
        self.category
    }

    pub fn kind(&self) -> u8 {
        self.kind
    }

    pub fn derived_type_spec(&self) -> Option<&DerivedTypeSpec> {
        self.derived.as_ref()
    }

    pub fn is_polymorphic(&self) -> bool {
        self.polymorphic
    }

    pub fn is_unlimited_polymorphic(&self) -> bool {
        self.polymorphic && self.derived.is_none()
    }

    pub fn is_assumed_type(&self) -> bool {
        self.category == TypeCategory::Derived && !self.polymorphic && self.derived.is_none()
    }

    pub fn is_typeless_intrinsic_argument(&self) -> bool {
        self.category == TypeCategory::Integer && self.kind == 0
    }

    /// The same type with polymorphism dropped: `CLASS(t)` becomes `TYPE(t)`.
    pub fn declared(&self) -> Self {
        Self {
            polymorphic: false,
            ..self.clone()
        }
    }

    /// Type compatibility in the sense of F2018 7.3.2.3: can an entity whose
    /// type is `that` be associated with an entity declared with `self`?
    pub fn is_type_compatible_with(&self, that: &DynamicType) -> bool {
        if self.is_unlimited_polymorphic() || self.is_assumed_type() {
            return !that.is_typeless_intrinsic_argument();
        }
        if that.is_assumed_type() || that.is_unlimited_polymorphic() {
            return false;
        }
        if self.category != that.category {
            return false;
        }
        match (&self.derived, &that.derived) {
            (Some(mine), Some(theirs)) => {
                if self.polymorphic {
                    theirs.extends(mine)
                } else {
                    mine.name == theirs.name
                }
            }
            (None, None) => self.kind == that.kind,
            _ => false,
        }
    }

    /// Type and kind compatibility as used for generic resolution
    /// (F2018 15.4.3.4.5); directional like [`Self::is_type_compatible_with`].
    pub fn is_tk_compatible_with(&self, that: &DynamicType) -> bool {
        if self.is_unlimited_polymorphic()
            || that.is_unlimited_polymorphic()
            || self.is_assumed_type()
            || that.is_assumed_type()
        {
            return true;
        }
        if self.category != that.category {
            return false;
        }
        match (&self.derived, &that.derived) {
            (Some(mine), Some(theirs)) => {
                mine.name == theirs.name || (self.polymorphic && theirs.extends(mine))
            }
            (None, None) => self.kind == that.kind,
            _ => false,
        }
    }

    /// Fortran spelling, with an optional character length expression.
    pub fn as_fortran(&self, length: Option<&str>) -> String {
        match (&self.derived, self.category) {
            (Some(spec), _) if self.polymorphic => format!("CLASS({})", spec.name),
            (Some(spec), _) => format!("TYPE({})", spec.name),
            (None, TypeCategory::Derived) if self.polymorphic => "CLASS(*)".to_string(),
            (None, TypeCategory::Derived) => "TYPE(*)".to_string(),
            (None, TypeCategory::Integer) if self.kind == 0 => "TYPELESS".to_string(),
            (None, TypeCategory::Character) => match length {
                Some(len) => format!("CHARACTER(KIND={},LEN={})", self.kind, len),
                None => format!("CHARACTER(KIND={})", self.kind),
            },
            (None, category) => format!("{}({})", category.keyword(), self.kind),
        }
    }
}

impl fmt::Display for DynamicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_fortran(None))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Intent {
    #[default]
    Default,
    In,
    Out,
    InOut,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::Default => Ok(()),
            Intent::In => f.write_str("INTENT(IN)"),
            Intent::Out => f.write_str("INTENT(OUT)"),
            Intent::InOut => f.write_str("INTENT(IN OUT)"),
        }
    }
}
