//! Session lifecycle scripts

mod generator;

pub use generator::{
    tunnel_script, GeneratedScript, ScriptGenerator, DEFAULT_RUNTIME, START_SCRIPT, STOP_SCRIPT,
    TUNNEL_SCRIPT,
};
