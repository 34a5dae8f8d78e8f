// ── Rollover workflow ──
//
// Phase 1 creates new keys, signs them and publishes the new TLSA records
// next to the old ones. Phase 2 installs the new certs and then replaces
// all TLSA records with the current ones. Certs without domains are
// skipped by every step.

use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use strum::{Display, EnumIter, IntoStaticStr};
use tracing::{debug, info};

use crate::error::CoreError;
use crate::model::{Cert, CertId, ScriptSetting};
use crate::nsupdate::{self, UpdateMode};
use crate::registry::DomainGraph;
use crate::runner::{CommandRunner, Invocation};
use crate::tlsa::CertificateLoader;

// ── Steps ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Step {
    Key,
    Cert,
    AddTlsa,
    Rollover,
    UpdateTlsa,
    Phase1,
    Phase2,
    Full,
}

impl Step {
    pub const fn description(self) -> &'static str {
        match self {
            Self::Key => "Create private keys and associated CSRs",
            Self::Cert => "Call the sign script to create certs and chains",
            Self::AddTlsa => "Add TLSA records for the new certs",
            Self::Rollover => "Call the rollover scripts to install the new certs",
            Self::UpdateTlsa => "Delete all TLSA records and add only the current ones",
            Self::Phase1 => "Do the key, cert and addtlsa steps",
            Self::Phase2 => "Do the rollover and updatetlsa steps",
            Self::Full => "Do all steps",
        }
    }

    /// The primitive steps this step runs, in order.
    pub const fn primitives(self) -> &'static [Self] {
        match self {
            Self::Key => &[Self::Key],
            Self::Cert => &[Self::Cert],
            Self::AddTlsa => &[Self::AddTlsa],
            Self::Rollover => &[Self::Rollover],
            Self::UpdateTlsa => &[Self::UpdateTlsa],
            Self::Phase1 => &[Self::Key, Self::Cert, Self::AddTlsa],
            Self::Phase2 => &[Self::Rollover, Self::UpdateTlsa],
            Self::Full => &[
                Self::Key,
                Self::Cert,
                Self::AddTlsa,
                Self::Rollover,
                Self::UpdateTlsa,
            ],
        }
    }
}

/// Which per-cert script a step calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum ScriptKind {
    Sign,
    Rollover,
}

// ── Tools ───────────────────────────────────────────────────────────

/// Programs and paths of the external tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tools {
    pub openssl: String,
    /// Base config prepended to the `[SAN]` section of multi-domain CSRs.
    pub openssl_config: PathBuf,
    pub nsupdate: String,
    /// Searched for `<kind>/<cert>` and `<kind>` when a cert sets no script.
    pub script_dir: PathBuf,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            openssl: "openssl".into(),
            openssl_config: "/etc/ssl/openssl.cnf".into(),
            nsupdate: "nsupdate".into(),
            script_dir: "/etc/sir".into(),
        }
    }
}

// ── Workflow ────────────────────────────────────────────────────────

pub struct Workflow<'a> {
    graph: DomainGraph,
    tools: Tools,
    runner: &'a dyn CommandRunner,
    loader: &'a dyn CertificateLoader,
}

impl<'a> Workflow<'a> {
    pub fn new(
        graph: DomainGraph,
        tools: Tools,
        runner: &'a dyn CommandRunner,
        loader: &'a dyn CertificateLoader,
    ) -> Self {
        Self {
            graph,
            tools,
            runner,
            loader,
        }
    }

    pub fn graph(&self) -> &DomainGraph {
        &self.graph
    }

    /// Run `step` and return the non-empty output of every script and
    /// `nsupdate` call. The first failure aborts the run.
    pub fn run(&mut self, step: Step) -> Result<Vec<String>, CoreError> {
        let mut outputs = Vec::new();
        for primitive in step.primitives() {
            info!(step = %primitive, "running step");
            match primitive {
                Step::Key => self.create_keys()?,
                Step::Cert => self.run_scripts(ScriptKind::Sign, &mut outputs)?,
                Step::AddTlsa => self.update_tlsa(UpdateMode::Add, &mut outputs)?,
                Step::Rollover => self.run_scripts(ScriptKind::Rollover, &mut outputs)?,
                Step::UpdateTlsa => self.update_tlsa(UpdateMode::Replace, &mut outputs)?,
                Step::Phase1 | Step::Phase2 | Step::Full => {}
            }
        }
        Ok(outputs)
    }

    fn active_certs(&self) -> Vec<CertId> {
        self.graph
            .certs
            .iter()
            .filter(|(_, cert)| !cert.domains().is_empty())
            .map(|(id, _)| id)
            .collect()
    }

    // ── key ─────────────────────────────────────────────────────────

    fn create_keys(&self) -> Result<(), CoreError> {
        for id in self.active_certs() {
            let cert = self.graph.certs.get(id);
            remove_stale(&cert.key_file())?;
            remove_stale(&cert.csr_file())?;
            let invocation = self.key_request(cert)?;
            self.runner.run(&invocation)?;
        }
        Ok(())
    }

    /// The `openssl req` call producing a fresh key and CSR for `cert`.
    pub fn key_request(&self, cert: &Cert) -> Result<Invocation, CoreError> {
        let domains: Vec<_> = cert
            .domains()
            .iter()
            .map(|id| self.graph.domains.get(*id))
            .collect();

        let invocation = Invocation::new(&self.tools.openssl).args([
            "req".to_owned(),
            "-batch".to_owned(),
            "-new".to_owned(),
            "-nodes".to_owned(),
            "-newkey".to_owned(),
            cert.spec().key_type.clone(),
            "-keyout".to_owned(),
            cert.key_file().display().to_string(),
            "-out".to_owned(),
            cert.csr_file().display().to_string(),
        ]);

        if let [single] = domains.as_slice() {
            return Ok(invocation.args(["-subj".to_owned(), format!("/CN={}", single.name())]));
        }

        let path = &self.tools.openssl_config;
        let base = std::fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
        let sans = domains
            .iter()
            .map(|d| d.san())
            .collect::<Vec<_>>()
            .join(",");
        let mut config = base;
        let _ = write!(
            config,
            "\n[SAN]\nsubjectAltName={sans}\n{}\n",
            cert.spec().extra_conf
        );

        Ok(invocation
            .args(["-reqexts", "SAN", "-config", "/proc/self/fd/0", "-subj", "/"])
            .stdin(config))
    }

    // ── cert / rollover ─────────────────────────────────────────────

    fn run_scripts(&self, kind: ScriptKind, outputs: &mut Vec<String>) -> Result<(), CoreError> {
        for id in self.active_certs() {
            let cert = self.graph.certs.get(id);
            let Some(script) = self.resolve_script(cert, kind)? else {
                continue;
            };
            let files = match kind {
                ScriptKind::Sign => [cert.csr_file(), cert.cert_file(), cert.chain_file()],
                ScriptKind::Rollover => [cert.key_file(), cert.cert_file(), cert.chain_file()],
            };
            let invocation = script.args(files.iter().map(|f| f.display().to_string()));
            push_output(outputs, self.runner.run(&invocation)?);
        }
        Ok(())
    }

    /// The command a cert uses for `kind`, without its file arguments.
    pub fn resolve_script(&self, cert: &Cert, kind: ScriptKind) -> Result<Option<Invocation>, CoreError> {
        let setting = match kind {
            ScriptKind::Sign => &cert.spec().sign_script,
            ScriptKind::Rollover => &cert.spec().rollover_script,
        };

        match setting {
            ScriptSetting::Disabled => {
                debug!(cert = cert.name(), %kind, "script disabled");
                Ok(None)
            }
            ScriptSetting::Command(line) => {
                info!(cert = cert.name(), %kind, script = %line, "using configured script");
                Invocation::from_command_line(line)
                    .map(Some)
                    .ok_or_else(|| CoreError::InvalidValue {
                        key: format!("{kind}Script"),
                        expected: "a shell command line",
                        path: cert.name().to_owned(),
                    })
            }
            ScriptSetting::Auto => {
                let kind_dir = self.tools.script_dir.join(<&str>::from(kind));
                for candidate in [kind_dir.join(cert.name()), kind_dir] {
                    if is_executable(&candidate) {
                        info!(
                            cert = cert.name(),
                            %kind,
                            script = %candidate.display(),
                            "no script configured, found one"
                        );
                        return Ok(Some(Invocation::new(candidate.display().to_string())));
                    }
                }
                info!(cert = cert.name(), %kind, "no script found");
                Ok(None)
            }
        }
    }

    // ── addtlsa / updatetlsa ────────────────────────────────────────

    fn update_tlsa(&mut self, mode: UpdateMode, outputs: &mut Vec<String>) -> Result<(), CoreError> {
        let scripts = nsupdate::generate(&mut self.graph, mode, self.loader)?;
        for script in scripts {
            let mut invocation = Invocation::new(&self.tools.nsupdate);
            if let Some(key_file) = &script.key_file {
                invocation = invocation.args(["-k".to_owned(), key_file.display().to_string()]);
            }
            push_output(outputs, self.runner.run(&invocation.stdin(script.body))?);
        }
        Ok(())
    }
}

fn push_output(outputs: &mut Vec<String>, output: String) {
    if !output.is_empty() {
        outputs.push(output);
    }
}

/// Remove a file left over from an earlier run. A missing file is fine.
fn remove_stale(path: &Path) -> Result<(), CoreError> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "removed stale file");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CoreError::io(path, e)),
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path).is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::RefCell;

    use pretty_assertions::assert_eq;
    use strum::IntoEnumIterator;
    use tempfile::TempDir;

    use super::*;
    use crate::walker::build_graph;

    /// Records every invocation and answers with a canned output.
    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<Invocation>>,
        fail_program: Option<String>,
    }

    impl CommandRunner for Recorder {
        fn run(&self, invocation: &Invocation) -> Result<String, CoreError> {
            self.calls.borrow_mut().push(invocation.clone());
            if self.fail_program.as_deref() == Some(invocation.program.as_str()) {
                return Err(CoreError::ExternalCommand {
                    command: invocation.command_line(),
                    code: Some(1),
                    output: "refused".into(),
                });
            }
            Ok(format!("ran {}", invocation.program))
        }
    }

    impl Recorder {
        fn programs(&self) -> Vec<String> {
            self.calls.borrow().iter().map(|c| c.program.clone()).collect()
        }
    }

    struct FixedLoader;

    impl CertificateLoader for FixedLoader {
        fn load_der(&self, _cert: &Cert) -> Result<Vec<u8>, CoreError> {
            Ok(vec![0x01, 0x02])
        }
    }

    struct Fixture {
        dir: TempDir,
        tools: Tools,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join("openssl.cnf"), "[req]\ndistinguished_name = dn\n").unwrap();
            let tools = Tools {
                openssl: "openssl".into(),
                openssl_config: dir.path().join("openssl.cnf"),
                nsupdate: "nsupdate".into(),
                script_dir: dir.path().join("scripts"),
            };
            Self { dir, tools }
        }

        fn graph(&self, certs: &str) -> DomainGraph {
            let root = self.dir.path().display();
            let yaml = format!(
                "certDefaults: {{keyDir: {root}, csrDir: {root}, certDir: {root}, chainDir: {root}}}\n\
                 recordDefaults: {{selector: FULL, type: EXACT}}\n\
                 {certs}"
            );
            build_graph(&serde_yaml::from_str(&yaml).unwrap()).unwrap()
        }

        fn path(&self, name: &str) -> String {
            self.dir.path().join(name).display().to_string()
        }

        #[cfg(unix)]
        fn install_script(&self, relative: &str) -> PathBuf {
            use std::os::unix::fs::PermissionsExt;

            let path = self.tools.script_dir.join(relative);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, "#!/bin/sh\n").unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }
    }

    const SINGLE: &str = r"
certs:
  - name: web
    signScript: /usr/local/bin/sign --ca 'internal ca'
    rolloverScript: none
    domains:
      - name: example.com
        zones: [{name: example.com, server: ns1, records: [{port: 443}]}]
  - name: idle
";

    #[test]
    fn phases_expand_to_primitive_steps() {
        assert_eq!(Step::Phase1.primitives(), &[Step::Key, Step::Cert, Step::AddTlsa]);
        assert_eq!(Step::Phase2.primitives(), &[Step::Rollover, Step::UpdateTlsa]);
        assert_eq!(Step::Full.primitives().len(), 5);
        let names: Vec<&str> = Step::iter().map(Into::into).collect();
        assert_eq!(
            names,
            vec!["key", "cert", "addtlsa", "rollover", "updatetlsa", "phase1", "phase2", "full"]
        );
    }

    #[test]
    fn single_domain_key_request_uses_common_name() {
        let fx = Fixture::new();
        let graph = fx.graph(SINGLE);
        let runner = Recorder::default();
        let wf = Workflow::new(graph, fx.tools.clone(), &runner, &FixedLoader);

        let cert = wf.graph().certs.get(wf.graph().certs.find("web").unwrap());
        let inv = wf.key_request(cert).unwrap();
        assert_eq!(inv.program, "openssl");
        assert_eq!(
            inv.args,
            vec![
                "req".to_owned(),
                "-batch".into(),
                "-new".into(),
                "-nodes".into(),
                "-newkey".into(),
                "rsa:4096".into(),
                "-keyout".into(),
                fx.path("web.pem"),
                "-out".into(),
                fx.path("web.pem"),
                "-subj".into(),
                "/CN=example.com".into(),
            ]
        );
        assert_eq!(inv.stdin, None);
    }

    #[test]
    fn multi_domain_key_request_pipes_san_config() {
        let fx = Fixture::new();
        let graph = fx.graph(
            r"
certs:
  - name: multi
    extraConf: keyUsage=digitalSignature
    domains: [{name: example.com}, {name: www.example.com}]
",
        );
        let runner = Recorder::default();
        let wf = Workflow::new(graph, fx.tools.clone(), &runner, &FixedLoader);

        let cert = wf.graph().certs.get(wf.graph().certs.find("multi").unwrap());
        let inv = wf.key_request(cert).unwrap();
        assert_eq!(
            inv.args[inv.args.len() - 6..],
            ["-reqexts", "SAN", "-config", "/proc/self/fd/0", "-subj", "/"]
        );
        assert_eq!(
            inv.stdin.as_deref(),
            Some(
                "[req]\ndistinguished_name = dn\n\n[SAN]\n\
                 subjectAltName=DNS:example.com,DNS:www.example.com\n\
                 keyUsage=digitalSignature\n"
            )
        );
    }

    #[test]
    fn key_step_removes_stale_files_and_skips_idle_certs() {
        let fx = Fixture::new();
        std::fs::write(fx.dir.path().join("web.pem"), "old").unwrap();
        let graph = fx.graph(SINGLE);
        let runner = Recorder::default();
        let mut wf = Workflow::new(graph, fx.tools.clone(), &runner, &FixedLoader);

        let outputs = wf.run(Step::Key).unwrap();
        assert!(outputs.is_empty());
        assert!(!fx.dir.path().join("web.pem").exists());
        assert_eq!(runner.programs(), vec!["openssl"]);
    }

    #[test]
    fn configured_sign_script_gets_csr_cert_and_chain() {
        let fx = Fixture::new();
        let graph = fx.graph(SINGLE);
        let runner = Recorder::default();
        let mut wf = Workflow::new(graph, fx.tools.clone(), &runner, &FixedLoader);

        let outputs = wf.run(Step::Cert).unwrap();
        assert_eq!(outputs, vec!["ran /usr/local/bin/sign"]);

        let calls = runner.calls.borrow();
        assert_eq!(
            calls[0].args,
            vec![
                "--ca".to_owned(),
                "internal ca".into(),
                fx.path("web.pem"),
                fx.path("web.pem"),
                fx.path("web.pem"),
            ]
        );
    }

    #[test]
    fn disabled_rollover_script_runs_nothing() {
        let fx = Fixture::new();
        let graph = fx.graph(SINGLE);
        let runner = Recorder::default();
        let mut wf = Workflow::new(graph, fx.tools.clone(), &runner, &FixedLoader);

        assert!(wf.run(Step::Rollover).unwrap().is_empty());
        assert!(runner.calls.borrow().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn per_cert_script_wins_over_global_one() {
        let fx = Fixture::new();
        let specific = fx.install_script("rollover/web");

        let graph = fx.graph("certs: [{name: web, domains: [{name: example.com}]}, {name: api, domains: [{name: api.example.com}]}]");
        let runner = Recorder::default();
        let wf = Workflow::new(graph, fx.tools.clone(), &runner, &FixedLoader);

        let web = wf.graph().certs.get(wf.graph().certs.find("web").unwrap());
        let api = wf.graph().certs.get(wf.graph().certs.find("api").unwrap());
        assert_eq!(
            wf.resolve_script(web, ScriptKind::Rollover).unwrap(),
            Some(Invocation::new(specific.display().to_string()))
        );
        // `rollover` is a directory here, so there is no global fallback.
        assert_eq!(wf.resolve_script(api, ScriptKind::Rollover).unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn global_script_is_the_fallback() {
        let fx = Fixture::new();
        let global = fx.install_script("sign");
        let graph = fx.graph("certs: [{name: web, domains: [{name: example.com}]}]");
        let runner = Recorder::default();
        let wf = Workflow::new(graph, fx.tools.clone(), &runner, &FixedLoader);

        let web = wf.graph().certs.get(wf.graph().certs.find("web").unwrap());
        assert_eq!(
            wf.resolve_script(web, ScriptKind::Sign).unwrap(),
            Some(Invocation::new(global.display().to_string()))
        );
    }

    #[cfg(unix)]
    #[test]
    fn non_executable_script_is_ignored() {
        let fx = Fixture::new();
        std::fs::create_dir_all(&fx.tools.script_dir).unwrap();
        std::fs::write(fx.tools.script_dir.join("sign"), "#!/bin/sh\n").unwrap();
        let graph = fx.graph("certs: [{name: web, domains: [{name: example.com}]}]");
        let runner = Recorder::default();
        let wf = Workflow::new(graph, fx.tools.clone(), &runner, &FixedLoader);

        let web = wf.graph().certs.get(wf.graph().certs.find("web").unwrap());
        assert_eq!(wf.resolve_script(web, ScriptKind::Sign).unwrap(), None);
    }

    #[test]
    fn tlsa_steps_feed_scripts_to_nsupdate() {
        let fx = Fixture::new();
        let graph = fx.graph(
            r"
certs:
  - name: web
    domains:
      - name: example.com
        zones:
          - {name: example.com, server: ns1, records: [{port: 443}]}
          - {name: example.com, server: ns1, keyFile: /etc/sir/k.key, records: [{port: 25}]}
",
        );
        let runner = Recorder::default();
        let mut wf = Workflow::new(graph, fx.tools.clone(), &runner, &FixedLoader);

        wf.run(Step::UpdateTlsa).unwrap();
        let calls = runner.calls.borrow();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].args.is_empty());
        assert_eq!(calls[1].args, vec!["-k", "/etc/sir/k.key"]);
        assert_eq!(
            calls[0].stdin.as_deref(),
            Some(
                "server ns1 53\nzone example.com.\n\
                 update delete _443._tcp.example.com. TLSA\n\
                 update add _443._tcp.example.com. 3600 TLSA 3 0 0 0102\nsend\n"
            )
        );
    }

    #[test]
    fn failing_command_aborts_the_phase() {
        let fx = Fixture::new();
        let graph = fx.graph(SINGLE);
        let runner = Recorder {
            fail_program: Some("/usr/local/bin/sign".into()),
            ..Recorder::default()
        };
        let mut wf = Workflow::new(graph, fx.tools.clone(), &runner, &FixedLoader);

        let err = wf.run(Step::Phase1).unwrap_err();
        assert!(matches!(err, CoreError::ExternalCommand { code: Some(1), .. }));
        // key ran, cert failed, addtlsa never started
        assert_eq!(runner.programs(), vec!["openssl", "/usr/local/bin/sign"]);
    }
}
