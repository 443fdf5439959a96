//! Compilation driver
//!
//! Loads the input files, follows `#include_file` directives, runs the
//! entity pipeline and renders whatever diagnostics it recorded.

mod loader;

pub use loader::{FileLoader, FsLoader, LoadedFile, MemoryLoader};

use std::collections::{HashSet, VecDeque};
use std::fmt::Write as _;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::common::{CompileError, CompileResult, DiagnosticReporter, Span};
use crate::frontend::lexer::OnyxLexer;
use crate::frontend::parser::parse_source;
use crate::program::Program;

/// First static data address; 0 stays null
pub const DEFAULT_DATA_BASE: u32 = 8;

/// Options for one compilation
#[derive(Debug, Clone)]
pub struct CompileConfig {
    pub verbose: bool,
    pub dump_tokens: bool,
    pub dump_entities: bool,
    /// Searched for `#include_file` and `#file_contents`
    pub include_dirs: Vec<PathBuf>,
    pub data_base: u32,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            dump_tokens: false,
            dump_entities: false,
            include_dirs: Vec::new(),
            data_base: DEFAULT_DATA_BASE,
        }
    }
}

/// Owns the program and the rendered sources for one compilation
pub struct Driver {
    config: CompileConfig,
    program: Program,
    reporter: DiagnosticReporter,
    /// Canonical names of every file parsed so far
    seen: HashSet<String>,
}

impl Driver {
    pub fn new(config: CompileConfig) -> Self {
        let program = Program::new(config.data_base);
        Self {
            config,
            program,
            reporter: DiagnosticReporter::new(),
            seen: HashSet::new(),
        }
    }

    pub fn config(&self) -> &CompileConfig {
        &self.config
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn into_program(self) -> Program {
        self.program
    }

    pub fn reporter(&self) -> &DiagnosticReporter {
        &self.reporter
    }

    /// Parse every input and its includes, then resolve. Returns true when
    /// the program came out without diagnostics. Resolution is skipped if a
    /// file failed to load or parse.
    pub fn compile(&mut self, loader: &dyn FileLoader, inputs: &[String]) -> bool {
        let mut parsed_ok = true;
        for input in inputs {
            if let Err(error) = self.load_with_includes(loader, input) {
                self.program.diagnostics.report(None, error);
                parsed_ok = false;
            }
        }
        if !parsed_ok {
            return false;
        }

        info!(files = self.seen.len(), entities = self.program.entity_count(), "resolving");
        let ok = self.program.resolve(loader);
        info!(
            ok,
            diagnostics = self.program.diagnostics.len(),
            heap_start = self.program.data.heap_start(),
            "resolution done"
        );
        ok
    }

    /// Parse `path`, then every file it includes, each at most once
    pub fn load_with_includes(&mut self, loader: &dyn FileLoader, path: &str) -> CompileResult<()> {
        let mut queue = VecDeque::from([path.to_string()]);

        while let Some(next) = queue.pop_front() {
            let file = loader.load(&next)?;
            if !self.seen.insert(file.name.clone()) {
                debug!(file = %file.name, "already loaded");
                continue;
            }

            let source = String::from_utf8(file.bytes)
                .map_err(|_| CompileError::lexer(format!("'{}' is not valid UTF-8", file.name), Span::default()))?;
            let file_id = self.reporter.add_file(file.name.clone(), source.clone());
            info!(file = %file.name, file_id, "parsing");

            if self.config.dump_tokens {
                eprintln!("=== Tokens: {} ===", file.name);
                for token in OnyxLexer::new(&source, file_id).tokenize_all()? {
                    eprintln!("{:>5}..{:<5} {}", token.span.start, token.span.end, token.kind);
                }
                eprintln!("=== End Tokens ===\n");
            }

            let parsed = parse_source(&mut self.program, &source, file_id)?;
            queue.extend(parsed.includes);
        }
        Ok(())
    }

    /// Print every recorded diagnostic to stderr
    pub fn emit_diagnostics(&self) {
        for diagnostic in self.program.diagnostics.iter() {
            self.reporter.report_error(&diagnostic.error);
        }
    }

    /// Diagnostics rendered without color, in report order
    pub fn render_diagnostics(&self) -> Vec<String> {
        self.program
            .diagnostics
            .iter()
            .map(|diagnostic| self.reporter.render(&diagnostic.error))
            .collect()
    }

    /// One line per entity: id, state, package and what it is
    pub fn dump_entities(&self) -> String {
        let mut out = String::new();
        for (id, entity) in self.program.entities() {
            let package = self.program.package(entity.package);
            let _ = writeln!(
                out,
                "{:>4} {:<14} {:<10} {}",
                id.to_raw(),
                format!("{:?}", entity.state),
                self.program.name(package.name),
                self.program.entity_label(id),
            );
        }
        out
    }
}

/// Compile in-memory files, passing each one as an input
#[cfg(test)]
pub(crate) fn compile_sources(files: &[(&str, &str)]) -> (Driver, bool) {
    let loader = files
        .iter()
        .fold(MemoryLoader::new(), |loader, (name, source)| loader.with_file(*name, *source));
    let inputs: Vec<String> = files.iter().map(|(name, _)| (*name).to_string()).collect();
    let mut driver = Driver::new(CompileConfig::default());
    let ok = driver.compile(&loader, &inputs);
    (driver, ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Decl, NodeKind};

    fn compile_with(loader: &MemoryLoader, inputs: &[&str]) -> (Driver, bool) {
        let inputs: Vec<String> = inputs.iter().map(|s| (*s).to_string()).collect();
        let mut driver = Driver::new(CompileConfig::default());
        let ok = driver.compile(loader, &inputs);
        (driver, ok)
    }

    #[test]
    fn test_include_cycle_loads_each_file_once() {
        let loader = MemoryLoader::new()
            .with_file(
                "main.onyx",
                "#include_file \"lib.onyx\"\nmain :: proc () -> i32 { return helper(); }\n",
            )
            .with_file(
                "lib.onyx",
                "#include_file \"./main.onyx\"\nhelper :: proc () -> i32 { return 1; }\n",
            );
        let (driver, ok) = compile_with(&loader, &["main.onyx"]);
        assert!(ok, "{:?}", driver.render_diagnostics());
        assert_eq!(driver.seen.len(), 2);
    }

    #[test]
    fn test_parse_error_skips_resolution() {
        let (driver, ok) = compile_sources(&[("main.onyx", "main :: proc ( { }\n")]);
        assert!(!ok);
        let errors: Vec<&CompileError> = driver.program().diagnostics.iter().map(|d| &d.error).collect();
        assert!(matches!(errors[..], [CompileError::Parser { .. }]));
    }

    #[test]
    fn test_missing_input() {
        let (driver, ok) = compile_with(&MemoryLoader::new(), &["absent.onyx"]);
        assert!(!ok);
        assert!(matches!(
            driver.program().diagnostics.iter().next().map(|d| &d.error),
            Some(CompileError::Io(_))
        ));
    }

    #[test]
    fn test_file_contents_placement() {
        let loader = MemoryLoader::new()
            .with_file("main.onyx", "blob :: #file_contents \"blob.bin\";\n")
            .with_file("blob.bin", "abc");
        let (driver, ok) = compile_with(&loader, &["main.onyx"]);
        assert!(ok, "{:?}", driver.render_diagnostics());

        let program = driver.program();
        let Some(Decl::Node(node)) = program.find("main", "blob") else {
            panic!("blob is not bound");
        };
        assert!(matches!(
            program.ast.node(node).kind,
            NodeKind::FileContents {
                addr: Some(16),
                size: Some(3),
                ..
            }
        ));
    }

    #[test]
    fn test_dump_and_render() {
        let (driver, ok) = compile_sources(&[("main.onyx", "x :: 1;\ny :: x + missing;\n")]);
        assert!(!ok);

        let dump = driver.dump_entities();
        assert!(dump.contains("Finalized"));
        assert!(dump.contains("expression 'x'"));

        let rendered = driver.render_diagnostics();
        assert_eq!(rendered.len(), 1);
        assert!(rendered[0].contains("unresolved symbol 'missing'"), "{}", rendered[0]);
    }
}
