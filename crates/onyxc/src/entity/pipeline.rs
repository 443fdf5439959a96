//! The sweep loop driving entities to a terminal state

use tracing::{debug, trace, warn};

use super::resolver::Resolver;
use super::{BlockedOn, EntityId, EntityState, Stall};
use crate::common::{BlockedEntity, CompileError};
use crate::driver::FileLoader;
use crate::program::Program;

pub struct Pipeline<'a> {
    program: &'a mut Program,
    loader: &'a dyn FileLoader,
    sweeps: usize,
}

impl<'a> Pipeline<'a> {
    pub fn new(program: &'a mut Program, loader: &'a dyn FileLoader) -> Self {
        Self {
            program,
            loader,
            sweeps: 0,
        }
    }

    /// Sweep until every entity is finalized or failed. Returns the number
    /// of sweeps performed.
    pub fn run(mut self) -> usize {
        loop {
            self.sweeps += 1;
            let mut progressed = false;
            let mut blocked = Vec::new();

            for index in 0..self.program.entity_count() {
                let id = EntityId::from_raw(index as u32);
                let before = self.program.entity(id).state;
                if before.is_terminal() {
                    continue;
                }
                let stall = self.advance(id);
                if self.program.entity(id).state != before {
                    progressed = true;
                }
                if let Some(reason) = stall {
                    blocked.push((id, reason));
                }
            }

            debug!(sweep = self.sweeps, blocked = blocked.len(), "sweep finished");
            if blocked.is_empty() {
                break;
            }
            if !progressed {
                self.report_cycle(blocked);
                break;
            }
        }
        self.sweeps
    }

    /// Run steps of one entity until it finishes, fails or stalls
    fn advance(&mut self, id: EntityId) -> Option<BlockedOn> {
        loop {
            let kind = self.program.entity(id).kind;
            let state = self.program.entity(id).state;
            let (result, next) = {
                let mut resolver = Resolver::new(&mut *self.program, self.loader, id);
                match state {
                    EntityState::Unresolved => (resolver.resolve_symbols(kind), EntityState::ResolvingTypes),
                    EntityState::ResolvingTypes => (resolver.resolve_types(kind), EntityState::Finalized),
                    EntityState::Finalized | EntityState::Error => return None,
                }
            };

            match result {
                Ok(()) => {
                    debug!(entity = %self.program.entity_label(id), state = ?next, "advanced");
                    self.program.set_state(id, next);
                }
                Err(Stall::Blocked(reason)) => {
                    trace!(entity = %self.program.entity_label(id), waiting_on = %reason.what, "blocked");
                    return Some(reason);
                }
                Err(Stall::Failed(error)) => {
                    debug!(entity = %self.program.entity_label(id), %error, "failed");
                    self.program.diagnostics.report(Some(id), error);
                    self.program.set_state(id, EntityState::Error);
                    return None;
                }
            }
        }
    }

    /// Nothing moved in a whole sweep: every blocked entity waits, directly
    /// or not, on another blocked entity.
    fn report_cycle(&mut self, blocked: Vec<(EntityId, BlockedOn)>) {
        let blocked: Vec<BlockedEntity> = blocked
            .into_iter()
            .map(|(entity, reason)| BlockedEntity {
                entity,
                label: self.program.entity_label(entity),
                waiting_on: reason.what,
                span: self.program.entity_span(entity),
            })
            .collect();

        warn!(count = blocked.len(), "resolution stalled");
        for entry in &blocked {
            self.program.set_state(entry.entity, EntityState::Error);
        }
        self.program
            .diagnostics
            .report(None, CompileError::CircularDependency { blocked });
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::ast::{Decl, NodeId, NodeKind, NumLit, TypeExprId, TypeExprKind};
    use crate::common::CompileError;
    use crate::entity::{EntityKind, EntityState};
    use crate::driver::{compile_sources, Driver};
    use crate::program::Program;
    use crate::types::{BasicKind, Intrinsic};

    fn compile(source: &str) -> (Driver, bool) {
        compile_sources(&[("main.onyx", source)])
    }

    fn node_decl(program: &Program, name: &str) -> NodeId {
        match program.find("main", name) {
            Some(Decl::Node(node)) => node,
            other => panic!("'{name}' is not a node: {other:?}"),
        }
    }

    fn type_decl(program: &Program, name: &str) -> TypeExprId {
        match program.find("main", name) {
            Some(Decl::Type(texpr)) => texpr,
            other => panic!("'{name}' is not a type: {other:?}"),
        }
    }

    fn body(program: &Program, name: &str) -> Vec<NodeId> {
        let NodeKind::Function(decl) = &program.ast.node(node_decl(program, name)).kind else {
            panic!("'{name}' is not a procedure");
        };
        let Some(block) = decl.body else {
            panic!("'{name}' has no body");
        };
        match &program.ast.node(block).kind {
            NodeKind::Block(stmts) => stmts.clone(),
            other => panic!("unexpected body {other:?}"),
        }
    }

    fn errors(driver: &Driver) -> Vec<&CompileError> {
        driver.program().diagnostics.iter().map(|d| &d.error).collect()
    }

    fn type_name_of(program: &Program, node: NodeId) -> String {
        program.type_name(program.ast.node(node).ty.unwrap())
    }

    #[test]
    fn test_pointer_cycle_resolves() {
        let (driver, ok) = compile(
            "Node :: struct { value: i32, next: ^Node }\n\
             main :: proc () { n: Node; n.value = 3; p := ^n; p.next = p; }\n",
        );
        assert!(ok, "{:?}", errors(&driver));

        let program = driver.program();
        let layout = program.types.struct_layout(type_decl(program, "Node")).unwrap();
        assert_eq!((layout.size, layout.align), (8, 4));
        assert_eq!(layout.members[1].offset, 4);
    }

    #[test]
    fn test_value_cycle_is_reported_once() {
        let (driver, ok) = compile("A :: struct { b: B }\nB :: struct { a: A }\n");
        assert!(!ok);

        let errors = errors(&driver);
        assert_eq!(errors.len(), 1);
        let CompileError::CircularDependency { blocked } = errors[0] else {
            panic!("expected a cycle, got {:?}", errors[0]);
        };
        let labels: Vec<&str> = blocked.iter().map(|b| b.label.as_str()).collect();
        assert!(labels.contains(&"struct 'A'"), "{labels:?}");
        assert!(labels.contains(&"struct 'B'"), "{labels:?}");
    }

    #[test]
    fn test_declaration_order_does_not_matter() {
        let area = "area :: proc (r: Rect) -> i32 { return r.w * r.h; }\n";
        let rect = "Rect :: struct { w: i32, h: i32 }\n";

        let mut results = Vec::new();
        for source in [format!("{area}{rect}"), format!("{rect}{area}")] {
            let (driver, ok) = compile(&source);
            assert!(ok, "{:?}", errors(&driver));
            let program = driver.program();
            let layout = program.types.struct_layout(type_decl(program, "Rect")).unwrap();
            results.push((layout.size, type_name_of(program, node_decl(program, "area"))));
        }
        assert_eq!(results[0], results[1]);
        assert_eq!(results[0], (8, "(Rect) -> i32".to_string()));
    }

    #[test]
    fn test_duplicate_overload_reported_once() {
        let (driver, ok) = compile(
            "f_int :: proc (x: i32) -> i32 { return x; }\n\
             f_int2 :: proc (y: i32) -> i32 { return y; }\n\
             f_float :: proc (x: f32) -> f32 { return x; }\n\
             f :: proc #overloaded { f_int, f_float, f_int2 }\n",
        );
        assert!(!ok);
        let errors = errors(&driver);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], CompileError::DuplicateOverload { name, .. } if name == "f"));
    }

    #[test]
    fn test_overload_selected_by_argument_type() {
        let (driver, ok) = compile(
            "show_int :: proc (x: i32) -> i32 { return x; }\n\
             show_float :: proc (x: f64) -> f64 { return x; }\n\
             show :: proc #overloaded { show_int, show_float }\n\
             main :: proc () { a := show(2); b := show(2.5); }\n",
        );
        assert!(ok, "{:?}", errors(&driver));

        let program = driver.program();
        let stmts = body(program, "main");
        assert_eq!(type_name_of(program, stmts[0]), "i32");
        assert_eq!(type_name_of(program, stmts[2]), "f64");
    }

    #[test]
    fn test_string_addresses_are_shared_and_stable() {
        let source = "greeting :: \"hello\";\nagain :: \"hello\";\nother :: \"bye\";\n";
        let addresses = |driver: &Driver| -> Vec<Option<u32>> {
            let program = driver.program();
            ["greeting", "again", "other"]
                .iter()
                .map(|name| match program.ast.node(node_decl(program, name)).kind {
                    NodeKind::StrLit { addr, .. } => addr,
                    _ => None,
                })
                .collect()
        };

        let (first, ok) = compile(source);
        assert!(ok, "{:?}", errors(&first));
        let (second, _) = compile(source);

        let addrs = addresses(&first);
        assert_eq!(addrs[0], Some(8));
        assert_eq!(addrs[0], addrs[1]);
        assert_ne!(addrs[0], addrs[2]);
        assert_eq!(addrs, addresses(&second));

        let program = first.program();
        let heap_start = program.builtins().unwrap().heap_start;
        assert_eq!(program.ast.node(heap_start).kind, NodeKind::NumLit(NumLit::Int(32)));
    }

    #[test]
    fn test_struct_type_derived_once() {
        let (driver, ok) = compile(
            "V :: struct { x: f32, y: f32 }\n\
             a :: proc (v: V) -> f32 { return v.x; }\n\
             b :: proc (v: ^V) -> f32 { return v.y; }\n\
             c : V;\n\
             s :: sizeof V;\n",
        );
        assert!(ok, "{:?}", errors(&driver));
        assert_eq!(driver.program().types.derivation_count(), 1);
    }

    #[test]
    fn test_intrinsic_declarations_and_calls() {
        let (driver, ok) = compile(
            "memory_size :: proc #intrinsic () -> i32 ---\n\
             clz :: proc #intrinsic \"clz_i32\" (x: i32) -> i32 ---\n\
             bogus :: proc #intrinsic () -> i32 ---\n\
             bad_sig :: proc #intrinsic \"clz_i32\" (x: i64) -> i32 ---\n\
             main :: proc () { n := clz(memory_size()); }\n",
        );
        assert!(!ok);
        let invalid = errors(&driver)
            .into_iter()
            .filter(|e| matches!(e, CompileError::InvalidIntrinsic { .. }))
            .count();
        assert_eq!(invalid, 2);

        let program = driver.program();
        let stmts = body(program, "main");
        let NodeKind::BinaryOp { right, .. } = program.ast.node(stmts[1]).kind else {
            panic!("expected an assignment");
        };
        let NodeKind::IntrinsicCall { intrinsic, args } = &program.ast.node(right).kind else {
            panic!("call was not rewritten");
        };
        assert_eq!(*intrinsic, Intrinsic::I32Clz);
        assert!(matches!(
            program.ast.node(args[0]).kind,
            NodeKind::IntrinsicCall {
                intrinsic: Intrinsic::MemorySize,
                ..
            }
        ));
    }

    #[test]
    fn test_use_package_declared_after_use() {
        let (driver, ok) = compile_sources(&[
            (
                "main.onyx",
                "main :: proc () -> i32 { return square(3) + m.cube(2); }\n\
                 use package math { square }\n\
                 use package math as m\n",
            ),
            (
                "math.onyx",
                "package math\n\
                 square :: proc (x: i32) -> i32 { return x * x; }\n\
                 cube :: proc (x: i32) -> i32 { return x * x * x; }\n",
            ),
        ]);
        assert!(ok, "{:?}", errors(&driver));
    }

    #[test]
    fn test_unknown_symbol_is_reported() {
        let (driver, ok) = compile("main :: proc () { nothing(); }\n");
        assert!(!ok);
        let errors = errors(&driver);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], CompileError::UnresolvedSymbol { name, .. } if name == "nothing"));
    }

    #[test]
    fn test_alias_and_pipe() {
        let (driver, ok) = compile(
            "main :: proc () -> i32 { return plus(1, 2) + (3 |> add(4)); }\n\
             add :: proc (a: i32, b: i32) -> i32 { return a + b; }\n\
             plus :: add;\n",
        );
        assert!(ok, "{:?}", errors(&driver));
    }

    #[test]
    fn test_struct_padding() {
        let (driver, ok) = compile(
            "P :: struct { a: u8, b: i32, c: u16 }\n\
             get :: proc (p: ^P) -> u16 { return p.c; }\n",
        );
        assert!(ok, "{:?}", errors(&driver));

        let program = driver.program();
        let layout = program.types.struct_layout(type_decl(program, "P")).unwrap();
        let offsets: Vec<u32> = layout.members.iter().map(|m| m.offset).collect();
        assert_eq!(offsets, vec![0, 4, 8]);
        assert_eq!((layout.size, layout.align), (12, 4));

        let stmts = body(program, "get");
        let NodeKind::Return(Some(value)) = program.ast.node(stmts[0]).kind else {
            panic!("expected a return");
        };
        assert!(matches!(
            program.ast.node(value).kind,
            NodeKind::FieldAccess { offset: Some(8), .. }
        ));
    }

    #[test]
    fn test_enum_values() {
        let (driver, ok) = compile(
            "Color :: enum { Red, Green :: 5, Blue }\n\
             Mode :: enum (u8) #flags { Read, Write, Exec }\n\
             favourite :: proc () -> Color { return Color.Blue; }\n",
        );
        assert!(ok, "{:?}", errors(&driver));

        let program = driver.program();
        let values = |name: &str| -> Vec<Option<i64>> {
            let TypeExprKind::Enum(decl) = &program.ast.type_expr(type_decl(program, name)).kind else {
                panic!("'{name}' is not an enum");
            };
            decl.values
                .iter()
                .map(|v| match program.ast.node(*v).kind {
                    NodeKind::EnumValue { resolved, .. } => resolved,
                    _ => None,
                })
                .collect()
        };
        assert_eq!(values("Color"), vec![Some(0), Some(5), Some(6)]);
        assert_eq!(values("Mode"), vec![Some(1), Some(2), Some(4)]);

        let info = program.types.enum_info(type_decl(program, "Mode")).unwrap();
        assert_eq!(info.backing, BasicKind::U8);
        assert!(info.flags);
    }

    #[test]
    fn test_break_outside_loop() {
        let (driver, _) = compile("main :: proc () { break; }\n");
        assert!(matches!(errors(&driver)[..], [CompileError::Semantic { .. }]));
    }

    #[test]
    fn test_assignment_type_mismatch() {
        let (driver, ok) = compile("main :: proc () { x := 1; y: f32 = x; }\n");
        assert!(!ok);
        let errors = errors(&driver);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "expected 'f32', found 'i32'");
    }

    #[test]
    fn test_failed_dependency_propagates() {
        let (driver, ok) = compile("S :: struct { x: Missing }\ng : S;\n");
        assert!(!ok);
        let errors = errors(&driver);
        assert!(errors.iter().any(|e| matches!(e, CompileError::UnresolvedSymbol { name, .. } if name == "Missing")));
        assert!(errors.iter().any(|e| matches!(e, CompileError::ErroneousDependency { .. })));
    }

    fn alias_root(program: &Program, name: &str) -> NodeId {
        program
            .entities()
            .find_map(|(_, entity)| match entity.kind {
                EntityKind::Expression {
                    root,
                    binding: Some(binding),
                } if program.name(binding.name) == name => Some(root),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_imported_alias_in_either_file_order() {
        let math = "package math\n\
                    add :: proc (a: i32, b: i32) -> i32 { return a + b; }\n\
                    plus :: add;\n";
        for import in ["use package math { plus }", "use package math"] {
            let main = format!("{import}\nmain :: proc () -> i32 {{ return plus(1, 2); }}\n");
            let main = main.as_str();
            for files in [[("main.onyx", main), ("math.onyx", math)], [("math.onyx", math), ("main.onyx", main)]] {
                let (driver, ok) = compile_sources(&files);
                assert!(ok, "{import}: {:?}", errors(&driver));

                let program = driver.program();
                let root = alias_root(program, "plus");
                assert_eq!(program.alias_target(root), program.find("math", "add"));
                assert_eq!(type_name_of(program, root), "(i32, i32) -> i32");
            }
        }
    }

    #[test]
    fn test_own_declaration_shadows_import() {
        let (driver, ok) = compile_sources(&[
            (
                "main.onyx",
                "use package math { square }\n\
                 square :: proc (x: f32) -> f32 { return x * x; }\n\
                 main :: proc () -> f32 { return square(2.0f); }\n",
            ),
            (
                "math.onyx",
                "package math\nsquare :: proc (x: i32) -> i32 { return x * x; }\n",
            ),
        ]);
        assert!(ok, "{:?}", errors(&driver));
    }

    #[test]
    fn test_oversized_array_is_an_error() {
        let (driver, ok) = compile("big : [0x40000000] i64;\nS :: struct { a: u8, b: [0x7FFFFFFF] i32 }\n");
        assert!(!ok);
        let errors = errors(&driver);
        assert_eq!(errors.len(), 2);
        for error in errors {
            assert!(matches!(error, CompileError::Semantic { .. }), "{error:?}");
            assert!(error.to_string().contains("too large"), "{error}");
        }
    }

    #[test]
    fn test_data_segment_overflow_is_an_error() {
        let (driver, ok) = compile("a : [0x7FFFFFFF] u8;\nb : [0x7FFFFFFF] u8;\nc : [0x7FFFFFFF] u8;\n");
        assert!(!ok);
        let errors = errors(&driver);
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.to_string().contains("does not fit")), "{errors:?}");

        let program = driver.program();
        assert!(matches!(
            program.ast.node(node_decl(program, "a")).kind,
            NodeKind::Memres { addr: Some(8), .. }
        ));
    }

    #[test]
    fn test_foreign_counts() {
        let (driver, ok) = compile(
            "print :: proc #foreign \"host\" \"print\" (x: i32) ---\n\
             trace :: proc #foreign \"host\" \"trace\" (x: i32) ---\n\
             counter :: global #foreign \"host\" \"counter\" i32;\n\
             total :: global i32;\n\
             main :: proc () { print(counter); trace(total); }\n",
        );
        assert!(ok, "{:?}", errors(&driver));
        assert_eq!(driver.program().foreign_function_count(), 2);
        assert_eq!(driver.program().foreign_global_count(), 1);
    }

    #[test]
    fn test_private_binding_hidden_from_other_packages() {
        let math = "package math\n\
                    #private secret :: proc () -> i32 { return 1; }\n\
                    reveal :: proc () -> i32 { return secret(); }\n";

        let (driver, ok) = compile_sources(&[
            ("main.onyx", "use package math as m\nmain :: proc () -> i32 { return m.reveal(); }\n"),
            ("math.onyx", math),
        ]);
        assert!(ok, "{:?}", errors(&driver));

        let (driver, ok) = compile_sources(&[
            ("main.onyx", "use package math as m\nmain :: proc () -> i32 { return m.secret(); }\n"),
            ("math.onyx", math),
        ]);
        assert!(!ok);
        let errors = errors(&driver);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], CompileError::UnresolvedSymbol { name, .. } if name == "math.secret"));
    }

    #[test]
    fn test_finalized_view_excludes_failed_entities() {
        let (driver, ok) = compile("x :: 1;\ny :: x + missing;\nz :: x * 2;\n");
        assert!(!ok);

        let program = driver.program();
        let labels: Vec<String> = program
            .finalized_entities()
            .map(|(id, _)| program.entity_label(id))
            .collect();
        assert!(labels.contains(&"expression 'x'".to_string()), "{labels:?}");
        assert!(labels.contains(&"expression 'z'".to_string()), "{labels:?}");
        assert!(!labels.contains(&"expression 'y'".to_string()), "{labels:?}");
        assert_eq!(labels.len(), program.entity_count() - 1);
        assert!(program.finalized_entities().all(|(_, e)| e.state == EntityState::Finalized));
    }
}
