/*
 * External-call taint tables
 *
 * For each known external function, three summaries describe what a call
 * taints (as a source) or endangers (as a sink):
 *
 * - value:  the values themselves (return value, argument values)
 * - direct: pointers only whose directly reachable memory is affected
 * - reach:  pointers whose entire reachable memory is affected
 *
 * Each summary names the return value, argument indices, and/or the
 * trailing vararg arguments.
 */

use lazy_static::lazy_static;

/// Which parts of a call one summary affects.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallTaintSummary {
    pub ret: bool,
    pub args: &'static [usize],
    pub varargs: bool,
}

/// Per-function entry: value, direct-pointer, and root-pointer summaries.
#[derive(Debug, Clone, Copy)]
pub struct CallTaintEntry {
    pub name: &'static str,
    pub value: CallTaintSummary,
    pub direct: CallTaintSummary,
    pub reach: CallTaintSummary,
}

const NOTHING: CallTaintSummary = CallTaintSummary { ret: false, args: &[], varargs: false };
const RET: CallTaintSummary = CallTaintSummary { ret: true, args: &[], varargs: false };
const VARARGS: CallTaintSummary = CallTaintSummary { ret: false, args: &[], varargs: true };
const ALL_ARGS: CallTaintSummary =
    CallTaintSummary { ret: false, args: &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9], varargs: true };

const fn args(indices: &'static [usize]) -> CallTaintSummary {
    CallTaintSummary { ret: false, args: indices, varargs: false }
}

const fn args_and_varargs(indices: &'static [usize]) -> CallTaintSummary {
    CallTaintSummary { ret: false, args: indices, varargs: true }
}

const fn args_and_ret(indices: &'static [usize]) -> CallTaintSummary {
    CallTaintSummary { ret: true, args: indices, varargs: false }
}

const fn entry(
    name: &'static str,
    value: CallTaintSummary,
    direct: CallTaintSummary,
    reach: CallTaintSummary,
) -> CallTaintEntry {
    CallTaintEntry { name, value, direct, reach }
}

lazy_static! {
    /// External calls whose results should be treated as tainted.
    pub static ref SOURCE_TAINT_SUMMARIES: Vec<CallTaintEntry> = vec![
        //     function    tainted values  tainted direct memory    tainted root ptrs
        entry("fopen",    RET,            RET,                     NOTHING),
        entry("freopen",  RET,            args_and_ret(&[2]),      NOTHING),
        entry("fflush",   RET,            args(&[0]),              NOTHING),
        entry("fclose",   RET,            args(&[0]),              NOTHING),
        entry("setbuf",   NOTHING,        args(&[0, 1]),           NOTHING),
        entry("setvbuf",  RET,            args(&[0, 1]),           NOTHING),
        entry("fread",    RET,            args(&[0, 3]),           NOTHING),
        entry("fwrite",   RET,            args(&[3]),              NOTHING),
        entry("fgetc",    RET,            args(&[0]),              NOTHING),
        entry("getc",     RET,            args(&[0]),              NOTHING),
        entry("fgets",    RET,            args(&[0, 2]),           NOTHING),
        entry("fputc",    RET,            args(&[1]),              NOTHING),
        entry("putc",     RET,            args(&[1]),              NOTHING),
        entry("fputs",    RET,            args(&[0, 1]),           NOTHING),
        entry("getchar",  RET,            NOTHING,                 NOTHING),
        entry("gets",     RET,            args(&[0]),              NOTHING),
        entry("putchar",  RET,            NOTHING,                 NOTHING),
        entry("puts",     RET,            NOTHING,                 NOTHING),
        entry("ungetc",   RET,            args(&[1]),              NOTHING),
        entry("printf",   RET,            VARARGS,                 NOTHING),
        entry("fprintf",  RET,            args_and_varargs(&[0]),  NOTHING),
        entry("scanf",    RET,            VARARGS,                 NOTHING),
        entry("fscanf",   RET,            args_and_varargs(&[0]),  NOTHING),
        entry("vscanf",   RET,            args(&[1]),              NOTHING),
        entry("vfscanf",  RET,            args(&[0, 2]),           NOTHING),
        entry("vprintf",  RET,            args(&[1]),              NOTHING),
        entry("vfprintf", RET,            args(&[0, 2]),           NOTHING),
        entry("ftell",    RET,            NOTHING,                 NOTHING),
        entry("feof",     RET,            NOTHING,                 NOTHING),
        entry("ferror",   RET,            NOTHING,                 NOTHING),
        entry("remove",   RET,            NOTHING,                 NOTHING),
        entry("fgetpos",  RET,            args(&[0, 1]),           NOTHING),
        entry("fseek",    RET,            args(&[0]),              NOTHING),
        entry("fsetpos",  RET,            args(&[0]),              NOTHING),
        entry("rewind",   NOTHING,        args(&[0]),              NOTHING),
        entry("clearerr", NOTHING,        args(&[0]),              NOTHING),
        entry("perror",   NOTHING,        NOTHING,                 NOTHING),
        entry("rename",   RET,            NOTHING,                 NOTHING),
        entry("tmpfile",  RET,            RET,                     NOTHING),
        entry("tmpnam",   RET,            args(&[0]),              NOTHING),
        entry("getenv",   RET,            RET,                     NOTHING),
    ];

    /// External calls whose inputs must be protected from taint.
    pub static ref SINK_TAINT_SUMMARIES: Vec<CallTaintEntry> = vec![
        entry("system",   ALL_ARGS,       args(&[0]),              NOTHING),
        entry("exec",     ALL_ARGS,       ALL_ARGS,                NOTHING),
        entry("execlp",   ALL_ARGS,       ALL_ARGS,                NOTHING),
        entry("execle",   ALL_ARGS,       ALL_ARGS,                NOTHING),
        entry("execv",    ALL_ARGS,       ALL_ARGS,                NOTHING),
        entry("execvp",   ALL_ARGS,       ALL_ARGS,                NOTHING),
        entry("execvpe",  ALL_ARGS,       ALL_ARGS,                NOTHING),
        entry("malloc",   args(&[0]),     NOTHING,                 NOTHING),
        entry("calloc",   args(&[0, 1]),  NOTHING,                 NOTHING),
        entry("realloc",  args(&[1]),     args(&[0]),              NOTHING),
        entry("remove",   ALL_ARGS,       args(&[0]),              NOTHING),
        entry("unlink",   ALL_ARGS,       args(&[0]),              NOTHING),
    ];
}

/// Mangled names of the C++ allocation operators whose arguments are
/// treated as sinks (`operator new`/`operator delete` families, including
/// array, nothrow, and aligned variants).
pub const CXX_ALLOC_SINKS: &[&str] = &[
    "_Znwm", "_Znam", "_ZnwmRKSt9nothrow_t", "_ZnamRKSt9nothrow_t", "_ZnwmSt11align_val_t",
    "_ZnamSt11align_val_t", "_ZdlPv", "_ZdaPv", "_ZdlPvm", "_ZdaPvm",
    "_ZdlPvRKSt9nothrow_t", "_ZdaPvRKSt9nothrow_t", "_ZdlPvSt11align_val_t",
    "_ZdaPvSt11align_val_t",
];

/// Find the table entry matching an external function name.
pub fn find_entry(table: &'static [CallTaintEntry], name: &str) -> Option<&'static CallTaintEntry> {
    table.iter().find(|e| e.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_table_lookup() {
        let getenv = find_entry(&SOURCE_TAINT_SUMMARIES, "getenv").unwrap();
        assert!(getenv.value.ret);
        assert!(getenv.direct.ret);
        assert!(find_entry(&SOURCE_TAINT_SUMMARIES, "system").is_none());
    }

    #[test]
    fn test_sink_table_lookup() {
        let system = find_entry(&SINK_TAINT_SUMMARIES, "system").unwrap();
        assert!(system.value.varargs);
        assert_eq!(system.direct.args, &[0]);

        let malloc = find_entry(&SINK_TAINT_SUMMARIES, "malloc").unwrap();
        assert_eq!(malloc.value.args, &[0]);
        assert!(!malloc.value.ret);
    }

    #[test]
    fn test_cxx_alloc_symbols_cover_scalar_and_array_forms() {
        assert!(CXX_ALLOC_SINKS.contains(&"_Znwm"));
        assert!(CXX_ALLOC_SINKS.contains(&"_ZdaPv"));
    }
}
