//! Import scanner for Python source files.
//!
//! The file is parsed into a real syntax tree; nothing is matched textually.
//! Every `import a.b` contributes `a.b` and every absolute `from x.y import z`
//! contributes `x.y`. Imported symbol names are never collected, and relative
//! imports are skipped because they never name an installable distribution.

use std::collections::BTreeSet;
use std::path::Path;

use log::debug;
use rustpython_parser::{Parse, ast};

use crate::error::{Error, Result};
use crate::runtime::Runtime;

/// Module paths imported by a source file. Duplicates collapse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSet {
    modules: BTreeSet<String>,
}

impl ImportSet {
    pub fn contains(&self, module: &str) -> bool {
        self.modules.contains(module)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(String::as_str)
    }

    /// First dotted component of every module, e.g. `os` for `os.path`.
    pub fn top_level(&self) -> BTreeSet<String> {
        self.modules
            .iter()
            .filter_map(|m| m.split('.').next())
            .map(str::to_string)
            .collect()
    }

    /// Top-level modules that are not part of the standard library. These
    /// are the names worth handing to pip.
    pub fn third_party(&self) -> BTreeSet<String> {
        self.top_level()
            .into_iter()
            .filter(|m| !is_stdlib(m))
            .collect()
    }

    fn insert(&mut self, module: &str) {
        if !module.is_empty() {
            self.modules.insert(module.to_string());
        }
    }
}

impl FromIterator<String> for ImportSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut set = ImportSet::default();
        for module in iter {
            set.insert(&module);
        }
        set
    }
}

/// Top-level modules shipped with CPython 3.11. Never installable from the index.
const STDLIB_MODULES: &[&str] = &[
    "__future__", "abc", "aifc", "antigravity", "argparse", "array", "ast", "asynchat",
    "asyncio", "asyncore", "atexit", "audioop", "base64", "bdb", "binascii", "bisect",
    "builtins", "bz2", "cProfile", "calendar", "cgi", "cgitb", "chunk", "cmath", "cmd", "code",
    "codecs", "codeop", "collections", "colorsys", "compileall", "concurrent", "configparser",
    "contextlib", "contextvars", "copy", "copyreg", "crypt", "csv", "ctypes", "curses",
    "dataclasses", "datetime", "dbm", "decimal", "difflib", "dis", "distutils", "doctest",
    "email", "encodings", "ensurepip", "enum", "errno", "faulthandler", "fcntl", "filecmp",
    "fileinput", "fnmatch", "fractions", "ftplib", "functools", "gc", "genericpath", "getopt",
    "getpass", "gettext", "glob", "graphlib", "grp", "gzip", "hashlib", "heapq", "hmac", "html",
    "http", "idlelib", "imaplib", "imghdr", "imp", "importlib", "inspect", "io", "ipaddress",
    "itertools", "json", "keyword", "lib2to3", "linecache", "locale", "logging", "lzma",
    "mailbox", "mailcap", "marshal", "math", "mimetypes", "mmap", "modulefinder", "msilib",
    "msvcrt", "multiprocessing", "netrc", "nis", "nntplib", "nt", "ntpath", "nturl2path",
    "numbers", "opcode", "operator", "optparse", "os", "ossaudiodev", "pathlib", "pdb",
    "pickle", "pickletools", "pipes", "pkgutil", "platform", "plistlib", "poplib", "posix",
    "posixpath", "pprint", "profile", "pstats", "pty", "pwd", "py_compile", "pyclbr", "pydoc",
    "pydoc_data", "pyexpat", "queue", "quopri", "random", "re", "readline", "reprlib",
    "resource", "rlcompleter", "runpy", "sched", "secrets", "select", "selectors", "shelve",
    "shlex", "shutil", "signal", "site", "smtpd", "smtplib", "sndhdr", "socket", "socketserver",
    "spwd", "sqlite3", "sre_compile", "sre_constants", "sre_parse", "ssl", "stat", "statistics",
    "string", "stringprep", "struct", "subprocess", "sunau", "symtable", "sys", "sysconfig",
    "syslog", "tabnanny", "tarfile", "telnetlib", "tempfile", "termios", "textwrap", "this",
    "threading", "time", "timeit", "tkinter", "token", "tokenize", "tomllib", "trace",
    "traceback", "tracemalloc", "tty", "turtle", "turtledemo", "types", "typing", "unicodedata",
    "unittest", "urllib", "uu", "uuid", "venv", "warnings", "wave", "weakref", "webbrowser",
    "winreg", "winsound", "wsgiref", "xdrlib", "xml", "xmlrpc", "zipapp", "zipfile",
    "zipimport", "zlib", "zoneinfo",
];

/// True when `module` (a top-level name) ships with the interpreter.
pub fn is_stdlib(module: &str) -> bool {
    STDLIB_MODULES.binary_search(&module).is_ok()
}

/// Parses `source` and collects its imports. `source_path` is only used in
/// error messages.
pub fn parse_imports(source: &str, source_path: &str) -> Result<ImportSet> {
    let suite = ast::Suite::parse(source, source_path)
        .map_err(|e| Error::parse(format!("{}: {}", source_path, e)))?;

    let mut imports = ImportSet::default();
    collect(&suite, &mut imports);
    debug!("{} import(s) found in {}", imports.len(), source_path);
    Ok(imports)
}

/// Reads a Python file and collects its imports.
///
/// An unreadable file is an input error; invalid syntax is a parse error.
#[tracing::instrument(skip(runtime))]
pub fn scan_imports<R: Runtime + ?Sized>(runtime: &R, path: &Path) -> Result<ImportSet> {
    let source = runtime
        .read_to_string(path)
        .map_err(|e| Error::input(format!("{:#}", e)))?;
    parse_imports(&source, &path.display().to_string())
}

fn collect(body: &[ast::Stmt], imports: &mut ImportSet) {
    for stmt in body {
        visit(stmt, imports);
    }
}

fn visit(stmt: &ast::Stmt, imports: &mut ImportSet) {
    match stmt {
        ast::Stmt::Import(node) => {
            for alias in &node.names {
                imports.insert(alias.name.as_str());
            }
        }
        ast::Stmt::ImportFrom(node) => {
            let relative = node.level.as_ref().is_some_and(|l| l.to_u32() > 0);
            match &node.module {
                Some(module) if !relative => imports.insert(module.as_str()),
                _ => debug!("Skipping relative import"),
            }
        }
        ast::Stmt::FunctionDef(node) => collect(&node.body, imports),
        ast::Stmt::AsyncFunctionDef(node) => collect(&node.body, imports),
        ast::Stmt::ClassDef(node) => collect(&node.body, imports),
        ast::Stmt::For(node) => {
            collect(&node.body, imports);
            collect(&node.orelse, imports);
        }
        ast::Stmt::AsyncFor(node) => {
            collect(&node.body, imports);
            collect(&node.orelse, imports);
        }
        ast::Stmt::While(node) => {
            collect(&node.body, imports);
            collect(&node.orelse, imports);
        }
        ast::Stmt::If(node) => {
            collect(&node.body, imports);
            collect(&node.orelse, imports);
        }
        ast::Stmt::With(node) => collect(&node.body, imports),
        ast::Stmt::AsyncWith(node) => collect(&node.body, imports),
        ast::Stmt::Match(node) => {
            for case in &node.cases {
                collect(&case.body, imports);
            }
        }
        ast::Stmt::Try(node) => {
            collect(&node.body, imports);
            for handler in &node.handlers {
                let ast::ExceptHandler::ExceptHandler(h) = handler;
                collect(&h.body, imports);
            }
            collect(&node.orelse, imports);
            collect(&node.finalbody, imports);
        }
        ast::Stmt::TryStar(node) => {
            collect(&node.body, imports);
            for handler in &node.handlers {
                let ast::ExceptHandler::ExceptHandler(h) = handler;
                collect(&h.body, imports);
            }
            collect(&node.orelse, imports);
            collect(&node.finalbody, imports);
        }
        _ => {}
    }
}
