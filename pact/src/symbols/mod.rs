//! Read-only symbol tables
//!
//! Built once per program before any unit is lowered, then shared by
//! reference. Lowering never mutates them.

use std::collections::HashMap;

use crate::ast::{EntityDef, EnumDef, EnumVariant, FnDef, Module, Program, Type};
use crate::util::to_pascal_case;

/// Declarations of one module
#[derive(Debug, Default)]
struct ModuleScope<'p> {
    primary: bool,
    entities: HashMap<&'p str, &'p EntityDef>,
    enums: HashMap<&'p str, &'p EnumDef>,
    /// Variant name → declaring enum
    variants: HashMap<&'p str, (&'p EnumDef, &'p EnumVariant)>,
    functions: HashMap<&'p str, &'p FnDef>,
}

/// Name resolution for the whole program
#[derive(Debug, Default)]
pub struct SymbolTable<'p> {
    modules: HashMap<&'p str, ModuleScope<'p>>,
}

impl<'p> SymbolTable<'p> {
    pub fn build(program: &'p Program) -> Self {
        let mut table = SymbolTable::default();
        for module in &program.modules {
            table
                .modules
                .insert(module.name.as_str(), ModuleScope::collect(module));
        }
        table
    }

    pub fn is_primary(&self, module: &str) -> bool {
        self.modules.get(module).is_none_or(|scope| scope.primary)
    }

    pub fn entity(&self, module: &str, name: &str) -> Option<&'p EntityDef> {
        self.modules.get(module)?.entities.get(name).copied()
    }

    pub fn enum_def(&self, module: &str, name: &str) -> Option<&'p EnumDef> {
        self.modules.get(module)?.enums.get(name).copied()
    }

    /// Resolve a variant name visible from `module` to its declaring enum
    pub fn variant(&self, module: &str, name: &str) -> Option<(&'p EnumDef, &'p EnumVariant)> {
        self.modules.get(module)?.variants.get(name).copied()
    }

    pub fn function(&self, module: &str, name: &str) -> Option<&'p FnDef> {
        self.modules.get(module)?.functions.get(name).copied()
    }

    /// Function names declared in `module`, for suggestions
    pub fn function_names(&self, module: &str) -> Vec<&'p str> {
        let mut names: Vec<&'p str> = self
            .modules
            .get(module)
            .map(|scope| scope.functions.keys().copied().collect())
            .unwrap_or_default();
        names.sort_unstable();
        names
    }

    /// Emitted name of a free function
    pub fn fn_name(&self, module: &str, name: &str) -> String {
        mangle_fn(module, self.is_primary(module), name)
    }

    /// Emitted name of an entity or enum
    pub fn type_name(&self, module: &str, name: &str) -> String {
        mangle_type(module, self.is_primary(module), name)
    }

    /// Emitted Rust type, seen from `module`
    pub fn rust_type(&self, module: &str, ty: &Type) -> String {
        match ty {
            Type::Int => "i64".to_string(),
            Type::Float => "f64".to_string(),
            Type::Bool => "bool".to_string(),
            Type::Str => "String".to_string(),
            Type::Unit => "()".to_string(),
            Type::Seq(elem) => format!("Vec<{}>", self.rust_type(module, elem)),
            Type::Result(ok, err) => format!(
                "Result<{}, {}>",
                self.rust_type(module, ok),
                self.rust_type(module, err)
            ),
            Type::Option(inner) => format!("Option<{}>", self.rust_type(module, inner)),
            Type::Named(name) => self.type_name(module, name),
            Type::Qualified { module: m, name } => self.type_name(m, name),
        }
    }

    /// Zero/default value of a type, as an expression
    pub fn default_value(&self, module: &str, ty: &Type) -> String {
        match ty {
            Type::Int => "0".to_string(),
            Type::Float => "0.0".to_string(),
            Type::Bool => "false".to_string(),
            Type::Str => "String::new()".to_string(),
            Type::Unit => "()".to_string(),
            Type::Seq(_) => "Vec::new()".to_string(),
            Type::Option(_) => "None".to_string(),
            Type::Named(_) | Type::Qualified { .. } => {
                format!("{}::default()", self.rust_type(module, ty))
            }
            Type::Result(..) => "Default::default()".to_string(),
        }
    }
}

impl<'p> ModuleScope<'p> {
    fn collect(module: &'p Module) -> Self {
        let mut scope = ModuleScope {
            primary: module.primary,
            ..ModuleScope::default()
        };
        for entity in &module.entities {
            scope.entities.insert(entity.name.as_str(), entity);
        }
        for enum_def in &module.enums {
            scope.enums.insert(enum_def.name.as_str(), enum_def);
            for variant in &enum_def.variants {
                scope.variants.insert(variant.name.as_str(), (enum_def, variant));
            }
        }
        for func in &module.functions {
            scope.functions.insert(func.name.as_str(), func);
        }
        scope
    }
}

/// `<module>_<name>` outside the primary module
pub fn mangle_fn(module: &str, primary: bool, name: &str) -> String {
    if primary {
        name.to_string()
    } else {
        format!("{module}_{name}")
    }
}

/// `<Module><Name>` outside the primary module
pub fn mangle_type(module: &str, primary: bool, name: &str) -> String {
    if primary {
        name.to_string()
    } else {
        format!("{}{}", to_pascal_case(module), name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Field;

    fn program() -> Program {
        let shapes = Module {
            name: "geometry".to_string(),
            primary: false,
            functions: vec![FnDef::new("area", vec![], Type::Int)],
            entities: vec![EntityDef::new("Point", vec![Field::new("x", Type::Int)])],
            enums: vec![EnumDef {
                name: "Shape".to_string(),
                variants: vec![EnumVariant {
                    name: "Circle".to_string(),
                    fields: vec![Field::new("radius", Type::Int)],
                }],
                docs: vec![],
                span: Default::default(),
            }],
        };
        let main = Module {
            name: "main".to_string(),
            primary: true,
            functions: vec![FnDef::new("main", vec![], Type::Unit)],
            ..Module::default()
        };
        Program {
            modules: vec![shapes, main],
        }
    }

    #[test]
    fn test_mangling_only_outside_primary() {
        let p = program();
        let table = SymbolTable::build(&p);
        assert_eq!(table.fn_name("geometry", "area"), "geometry_area");
        assert_eq!(table.fn_name("main", "main"), "main");
        assert_eq!(table.type_name("geometry", "Point"), "GeometryPoint");
    }

    #[test]
    fn test_variant_resolves_to_declaring_enum() {
        let p = program();
        let table = SymbolTable::build(&p);
        let (enum_def, variant) = table.variant("geometry", "Circle").unwrap();
        assert_eq!(enum_def.name, "Shape");
        assert_eq!(variant.fields[0].name, "radius");
        assert!(table.variant("main", "Circle").is_none());
    }

    #[test]
    fn test_rust_type_of_qualified_sequence() {
        let p = program();
        let table = SymbolTable::build(&p);
        let ty = Type::seq(Type::Qualified {
            module: "geometry".to_string(),
            name: "Point".to_string(),
        });
        assert_eq!(table.rust_type("main", &ty), "Vec<GeometryPoint>");
    }
}
