#![allow(dead_code)]

use std::collections::BTreeSet;

use f90check::characteristics::{
    DummyArgument, DummyDataObject, DummyDataObjectAttr, Procedure, ProcedureAttr, TypeAndShape,
};
use f90check::expr::{ActualArgument, Expr};
use f90check::fold::FoldingContext;
use f90check::intrinsics::IntrinsicProcTable;
use f90check::symbol::{
    Attr, DeclTypeSpec, Details, ObjectEntityDetails, ScopeId, ScopeKind, ShapeSpec, SymbolId,
    SymbolTable,
};
use f90check::types::{DynamicType, TypeCategory};

/// A main program scope holding the variables used as actual arguments.
pub struct Fixture {
    pub symbols: SymbolTable,
    pub scope: ScopeId,
    pub intrinsics: IntrinsicProcTable,
}

impl Fixture {
    pub fn new() -> Self {
        let mut symbols = SymbolTable::new();
        let scope = symbols.add_scope(
            ScopeKind::MainProgram,
            Some("main".to_string()),
            symbols.global(),
            None,
        );
        Self {
            symbols,
            scope,
            intrinsics: IntrinsicProcTable::configure(),
        }
    }

    pub fn ctx(&self) -> FoldingContext<'_> {
        FoldingContext::new(&self.symbols, &self.intrinsics)
    }

    pub fn variable(&mut self, name: &str, category: TypeCategory, extents: &[i64]) -> SymbolId {
        let object = ObjectEntityDetails {
            type_spec: Some(DeclTypeSpec::Intrinsic {
                category,
                kind: category.default_kind(),
                length: None,
            }),
            shape: extents
                .iter()
                .map(|extent| ShapeSpec::Explicit {
                    lower: None,
                    upper: Expr::int(*extent),
                })
                .collect(),
            ..Default::default()
        };
        self.symbols
            .add_symbol(self.scope, name, BTreeSet::new(), Details::Object(object), 0..0)
    }

    pub fn parameter(&mut self, name: &str, value: i64) -> SymbolId {
        let object = ObjectEntityDetails {
            type_spec: Some(DeclTypeSpec::Intrinsic {
                category: TypeCategory::Integer,
                kind: 4,
                length: None,
            }),
            init: Some(Expr::int(value)),
            ..Default::default()
        };
        let attrs = [Attr::Parameter].into_iter().collect();
        self.symbols
            .add_symbol(self.scope, name, attrs, Details::Object(object), 0..0)
    }
}

pub fn actual(id: SymbolId) -> Option<ActualArgument> {
    Some(ActualArgument::new(Expr::symbol(id)))
}

pub fn real_dummy(name: &str, extents: &[i64]) -> DummyArgument {
    typed_dummy(name, DynamicType::real(4), extents)
}

pub fn integer_dummy(name: &str) -> DummyArgument {
    typed_dummy(name, DynamicType::integer(4), &[])
}

pub fn typed_dummy(name: &str, dynamic_type: DynamicType, extents: &[i64]) -> DummyArgument {
    let type_and_shape = if extents.is_empty() {
        TypeAndShape::new(dynamic_type)
    } else {
        TypeAndShape::with_shape(
            dynamic_type,
            extents.iter().map(|extent| Some(Expr::int(*extent))).collect(),
        )
    };
    DummyArgument::data_object(name, DummyDataObject::new(type_and_shape))
}

pub fn optional(mut dummy: DummyArgument) -> DummyArgument {
    dummy.set_optional(true);
    dummy
}

pub fn with_attr(mut dummy: DummyArgument, attr: DummyDataObjectAttr) -> DummyArgument {
    if let f90check::characteristics::DummyKind::DataObject(object) = &mut dummy.kind {
        object.attrs.insert(attr);
    }
    dummy
}

pub fn subroutine(dummies: Vec<DummyArgument>) -> Procedure {
    Procedure::subroutine(dummies, BTreeSet::new())
}

pub fn elemental_subroutine(dummies: Vec<DummyArgument>) -> Procedure {
    Procedure::subroutine(
        dummies,
        [ProcedureAttr::Elemental, ProcedureAttr::Pure]
            .into_iter()
            .collect(),
    )
}
