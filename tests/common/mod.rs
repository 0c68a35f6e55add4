//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use kpacker::bundler::{
    CommandRunner, PackagingContext, ProcessOutput, Result, TempRegistry, ToolInvocation,
    toolchain::{ContainerEngine, EngineKind},
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

type Handler = Box<dyn Fn(&ToolInvocation) -> ProcessOutput + Send + Sync>;

/// Records every invocation and answers with `handler`.
pub struct MockRunner {
    calls: Mutex<Vec<ToolInvocation>>,
    handler: Handler,
}

impl MockRunner {
    pub fn new(handler: impl Fn(&ToolInvocation) -> ProcessOutput + Send + Sync + 'static) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            handler: Box::new(handler),
        }
    }

    /// Succeeds for everything without producing files.
    pub fn succeeding() -> Self {
        Self::new(|_| ok())
    }

    pub fn calls(&self) -> Vec<ToolInvocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Command lines of every recorded invocation, shell commands unwrapped.
    pub fn commands(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|call| shell_command(call).map_or_else(|| call.command_line(), str::to_string))
            .collect()
    }
}

impl std::fmt::Debug for MockRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockRunner").finish_non_exhaustive()
    }
}

impl CommandRunner for MockRunner {
    async fn output(&self, invocation: &ToolInvocation) -> Result<ProcessOutput> {
        self.calls.lock().unwrap().push(invocation.clone());
        Ok((self.handler)(invocation))
    }
}

pub fn ok() -> ProcessOutput {
    ProcessOutput::default()
}

pub fn ok_with(stdout: impl Into<String>) -> ProcessOutput {
    ProcessOutput {
        code: 0,
        stdout: stdout.into(),
        stderr: String::new(),
    }
}

pub fn fail(code: i32) -> ProcessOutput {
    ProcessOutput {
        code,
        stdout: String::new(),
        stderr: "mock failure".into(),
    }
}

/// The `sh -c` command of a container invocation.
pub fn shell_command(invocation: &ToolInvocation) -> Option<&str> {
    let args = invocation.arguments();
    let pos = args.windows(2).position(|w| w[0] == "sh" && w[1] == "-c")?;
    args.get(pos + 2).map(String::as_str)
}

/// Host directory mounted at `container_dir`.
pub fn host_path(invocation: &ToolInvocation, container_dir: &str) -> Option<PathBuf> {
    let suffix = format!(":{}", container_dir);
    invocation
        .arguments()
        .windows(2)
        .filter(|w| w[0] == "-v")
        .find_map(|w| w[1].strip_suffix(&suffix).map(PathBuf::from))
}

pub fn engine() -> ContainerEngine {
    ContainerEngine::new(EngineKind::Docker, "docker")
}

/// Isolated temp root, cache and registry.
pub struct Sandbox {
    pub root: tempfile::TempDir,
    pub registry: Arc<TempRegistry>,
}

impl Sandbox {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let registry = Arc::new(TempRegistry::with_root(root.path().join("tmp")));
        std::fs::create_dir_all(root.path().join("tmp")).unwrap();
        std::fs::create_dir_all(root.path().join("cache")).unwrap();
        std::fs::create_dir_all(root.path().join("src")).unwrap();
        std::fs::write(root.path().join("cache/default_icon.png"), b"\x89PNG default").unwrap();
        Self { root, registry }
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn source(&self) -> PathBuf {
        self.path().join("src")
    }

    pub fn cache(&self) -> PathBuf {
        self.path().join("cache")
    }

    pub fn out(&self) -> PathBuf {
        self.path().join("out")
    }

    pub fn context(&self, runner: MockRunner) -> PackagingContext<MockRunner> {
        PackagingContext::new(self.registry.clone(), runner, Some(engine()), self.cache())
    }

    pub fn context_without_engine(&self, runner: MockRunner) -> PackagingContext<MockRunner> {
        PackagingContext::new(self.registry.clone(), runner, None, self.cache())
    }
}

pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let mut writer = zip::ZipWriter::new(std::fs::File::create(path).unwrap());
    for (name, data) in entries {
        writer
            .start_file(*name, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap();
}

/// A jar whose manifest names `main_class`.
pub fn write_jar(dir: &Path, name: &str, main_class: Option<&str>) {
    let manifest = match main_class {
        Some(class) => format!("Manifest-Version: 1.0\r\nMain-Class: {}\r\n\r\n", class),
        None => "Manifest-Version: 1.0\r\n\r\n".to_string(),
    };
    write_zip(
        &dir.join(name),
        &[
            ("META-INF/MANIFEST.MF", manifest.as_bytes()),
            ("demo/Main.class", b"\xca\xfe\xba\xbe"),
        ],
    );
}

/// Seeds the cache with a base distribution named like its download URL.
pub fn write_distribution(cache: &Path, file_name: &str, entries: &[(&str, &[u8])]) {
    write_zip(&cache.join(file_name), entries);
}

/// macOS distribution with a launcher bundle and an Info.plist.
pub fn write_mac_distribution(cache: &Path) {
    write_distribution(
        cache,
        "mac_x64_template.zip",
        &[
            ("Launcher.app/Contents/MacOS/Launcher", b"\xcf\xfa\xed\xfe launcher"),
            ("Launcher.app/Contents/Info.plist", MAC_PLIST.as_bytes()),
            ("Launcher.app/Contents/runtime/lib/libjli.dylib", b"\xcf\xfa\xed\xfe"),
            ("Launcher.app/Contents/app/placeholder", b""),
            (".metadata", br#"{"executables":["Launcher.app/Contents/MacOS/Launcher"]}"#),
        ],
    );
}

/// Linux x64 distribution with a launcher binary.
pub fn write_linux_distribution(cache: &Path) {
    write_distribution(
        cache,
        "linux_x64_template.zip",
        &[
            ("Launcher/bin/Launcher", b"\x7fELF launcher"),
            ("Launcher/lib/runtime/release", b"JAVA_VERSION=21"),
            (".metadata", br#"{"executables":["Launcher/bin/Launcher"]}"#),
        ],
    );
}

const MAC_PLIST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
  <key>CFBundleExecutable</key>
  <string>Launcher</string>
  <key>CFBundleName</key>
  <string>Launcher</string>
  <key>CFBundleIdentifier</key>
  <string>com.example.launcher</string>
  <key>CFBundleIconFile</key>
  <string>Launcher.icns</string>
  <key>CFBundleShortVersionString</key>
  <string>0.0.0</string>
  <key>CFBundleVersion</key>
  <string>0.0.0</string>
</dict>
</plist>
"#;

/// Source directory with `demo.jar` plus extra files and a subdirectory.
pub fn populate_source(source: &Path) {
    write_jar(source, "demo.jar", Some("demo.Main"));
    std::fs::write(source.join("README.txt"), b"readme").unwrap();
    std::fs::write(source.join("config.properties"), b"key=value").unwrap();
    std::fs::create_dir_all(source.join("natives")).unwrap();
    std::fs::write(source.join("natives/libdemo.so"), b"native").unwrap();
}

/// Answers the udisksctl calls of a DMG build, mounting into `mounts`.
///
/// Every `udisksctl mount` creates a fresh directory below `mounts`.
pub fn dmg_tools(mounts: PathBuf) -> impl Fn(&ToolInvocation) -> ProcessOutput + Send + Sync {
    let counter = Mutex::new(0usize);
    move |invocation| {
        let args = invocation.arguments();
        if invocation.program() == "udisksctl" {
            return match args.first().map(String::as_str) {
                Some("loop-setup") => ok_with(format!(
                    "Mapped file {} as /dev/loop7.\n",
                    args.last().cloned().unwrap_or_default()
                )),
                Some("mount") => {
                    let mut n = counter.lock().unwrap();
                    *n += 1;
                    let dir = mounts.join(format!("volume{}", n));
                    std::fs::create_dir_all(&dir).unwrap();
                    ok_with(format!("Mounted /dev/loop7 at {}\n", dir.display()))
                }
                _ => ok(),
            };
        }
        if invocation.program() == "lsblk" {
            return ok_with("loop7\n");
        }
        if let Some(command) = shell_command(invocation) {
            if let Some(rest) = command.strip_prefix("dmg ") {
                let data = host_path(invocation, "/data").unwrap();
                let output = rest.split_whitespace().nth(1).unwrap();
                let name = output.trim_start_matches("/data/");
                std::fs::write(data.join(name), b"compressed").unwrap();
            }
        }
        ok()
    }
}
