pub mod ollama;
pub mod remote;

#[cfg(test)]
pub mod scripted;
