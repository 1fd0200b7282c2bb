pub mod gen_completions;
pub mod run;
