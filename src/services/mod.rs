pub mod characters;
pub mod comics;
pub mod llm;
pub mod magic;
pub mod prompts;
pub mod qa;
pub mod rag;
pub mod renderer;
pub mod stories;
pub mod story;

#[cfg(test)]
pub(crate) mod testing;
