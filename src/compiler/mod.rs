mod compilers;
mod fetcher;

pub use compilers::{
    compiler_input, process_output, CompilationError, CompiledContracts, SolcCompiler,
    SourceCompiler,
};
pub use fetcher::{FetchError, SolcFetcher};
