//! Lifecycle script generation
//!
//! Scripts are a pure function of the session: the same session always
//! produces byte-identical scripts.

use crate::session::Session;

pub const START_SCRIPT: &str = "run_container.sh";
pub const STOP_SCRIPT: &str = "stop_container.sh";
pub const TUNNEL_SCRIPT: &str = ".ssh_reverse_tunnel.sh";

/// Container runtime CLI used when none is configured
pub const DEFAULT_RUNTIME: &str = "docker";

/// Seconds the tunnel loop waits before reconnecting
const TUNNEL_RETRY_DELAY: u32 = 5;

/// One generated script and the file name it is written under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedScript {
    pub name: &'static str,
    pub contents: String,
}

#[derive(Debug, Clone)]
pub struct ScriptGenerator {
    runtime: String,
}

impl Default for ScriptGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_RUNTIME)
    }
}

impl ScriptGenerator {
    pub fn new(runtime: impl Into<String>) -> Self {
        Self {
            runtime: runtime.into(),
        }
    }

    /// Start and stop scripts, plus the tunnel script when the session has a
    /// reverse-proxy host
    pub fn generate(&self, session: &Session) -> Vec<GeneratedScript> {
        let mut scripts = vec![
            GeneratedScript {
                name: START_SCRIPT,
                contents: self.start_script(session),
            },
            GeneratedScript {
                name: STOP_SCRIPT,
                contents: self.stop_script(session),
            },
        ];
        if let Some(host) = session.reverse_proxy_host.as_deref() {
            scripts.push(GeneratedScript {
                name: TUNNEL_SCRIPT,
                contents: tunnel_script(session.port, host),
            });
        }
        scripts
    }

    pub fn start_script(&self, session: &Session) -> String {
        let key = session.key();
        let gpu_spec = if session.gpus.is_empty() {
            String::new()
        } else {
            format!("--gpus {}", session.gpus)
        };
        let publish = format!("-p {}:22", session.port);
        let name = format!("--name {} {}", key, key);
        let run = join_args(&[
            self.runtime.as_str(),
            "run -d",
            publish.as_str(),
            gpu_spec.as_str(),
            session.extra_run_args.as_str(),
            name.as_str(),
        ]);

        let mut script = script_header();
        script.push_str(&format!("{} || {} restart {}\n", run, self.runtime, key));
        if let Some(host) = session.reverse_proxy_host.as_deref() {
            script.push_str(&format!("ssh {} 'ufw allow {}/tcp'\n", host, session.port));
            script.push_str(&format!(
                "screen -S {}_port_forward -d -m ./{}\n",
                key, TUNNEL_SCRIPT
            ));
        }
        script.push_str("echo \"Container started\"\n");
        script
    }

    pub fn stop_script(&self, session: &Session) -> String {
        let key = session.key();
        let mut script = script_header();
        script.push_str(&format!(
            "{rt} stop {key} || {rt} kill {key}\n",
            rt = self.runtime,
            key = key
        ));
        if let Some(host) = session.reverse_proxy_host.as_deref() {
            script.push_str(&format!(
                "ssh {} 'ufw delete allow {}/tcp'\n",
                host, session.port
            ));
            script.push_str(&format!("screen -X -S {}_port_forward quit\n", key));
        }
        script.push_str("echo \"Container stopped\"\n");
        script
    }
}

fn script_header() -> String {
    "#!/usr/bin/env bash\ncd \"$(dirname \"$0\")\"\n".to_string()
}

/// Reverse port-forward from the proxy host that reconnects whenever the
/// connection drops
pub fn tunnel_script(port: u16, host: &str) -> String {
    format!(
        "#!/usr/bin/env bash\n\
         while true; do\n    \
         ssh -N -o ServerAliveInterval=30 -o ServerAliveCountMax=3 -o ExitOnForwardFailure=yes \
         -R 0.0.0.0:{port}:localhost:{port} {host}\n    \
         sleep {delay}\n\
         done\n",
        port = port,
        host = host,
        delay = TUNNEL_RETRY_DELAY
    )
}

fn join_args(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(proxy: Option<&str>) -> Session {
        Session {
            username: "alice".to_string(),
            port: 32041,
            public_key: "ssh-ed25519 AAAA alice@laptop".to_string(),
            image: "nvcr.io/nvidia/pytorch:23.10-py3".to_string(),
            gpus: String::new(),
            reverse_proxy_host: proxy.map(str::to_string),
            extra_run_args: String::new(),
            dry_run: false,
        }
    }

    #[test]
    fn test_start_script_without_proxy() {
        let script = ScriptGenerator::default().start_script(&session(None));
        assert_eq!(
            script,
            "#!/usr/bin/env bash\n\
             cd \"$(dirname \"$0\")\"\n\
             docker run -d -p 32041:22 --name alice_32041 alice_32041 || docker restart alice_32041\n\
             echo \"Container started\"\n"
        );
    }

    #[test]
    fn test_start_script_with_gpus_and_extra_args() {
        let mut s = session(None);
        s.gpus = "all".to_string();
        s.extra_run_args = "--shm-size 8g".to_string();
        let script = ScriptGenerator::new("podman").start_script(&s);
        assert!(script.contains(
            "podman run -d -p 32041:22 --gpus all --shm-size 8g --name alice_32041 alice_32041 \
             || podman restart alice_32041"
        ));
    }

    #[test]
    fn test_proxy_adds_tunnel() {
        let scripts = ScriptGenerator::default().generate(&session(Some("proxy.example.com")));
        let names: Vec<&str> = scripts.iter().map(|s| s.name).collect();
        assert_eq!(names, vec![START_SCRIPT, STOP_SCRIPT, TUNNEL_SCRIPT]);

        let start = &scripts[0].contents;
        assert!(start.contains("ssh proxy.example.com 'ufw allow 32041/tcp'"));
        assert!(start.contains("screen -S alice_32041_port_forward -d -m ./.ssh_reverse_tunnel.sh"));

        let tunnel = &scripts[2].contents;
        assert!(tunnel.contains("while true; do"));
        assert!(tunnel.contains("-R 0.0.0.0:32041:localhost:32041 proxy.example.com"));
    }

    #[test]
    fn test_stop_script_inverts_start() {
        let scripts = ScriptGenerator::default().generate(&session(Some("proxy")));
        let stop = &scripts[1].contents;
        assert!(stop.contains("docker stop alice_32041 || docker kill alice_32041"));
        assert!(stop.contains("ssh proxy 'ufw delete allow 32041/tcp'"));
        assert!(stop.contains("screen -X -S alice_32041_port_forward quit"));
    }

    #[test]
    fn test_no_proxy_no_tunnel() {
        let scripts = ScriptGenerator::default().generate(&session(None));
        assert_eq!(scripts.len(), 2);
        assert!(!scripts[1].contents.contains("ssh"));
    }

    #[test]
    fn test_generation_is_deterministic() {
        let generator = ScriptGenerator::default();
        let s = session(Some("proxy"));
        assert_eq!(generator.generate(&s), generator.generate(&s));
    }
}
