use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hotpatch_crypto::{ContainerDigests, ContentHasher};
use hotpatch_delta::{no_progress, ByteDiffEngine, EngineRegistry};
use hotpatch_diff::{
    diff_directories, diff_entries, BincodeCodec, ClassDiff, CodeDiffer, ContainerCodec,
    FileEntry, TreeChange, TreeDiff,
};
use hotpatch_pack::{
    Artifact, ArtifactSource, PackageContent, PatchManifest, PatchPacker, RESOURCE_TABLE_ENTRY,
};
use hotpatch_types::{ErrorKind, PatchId, PatchMode};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::GeneratorConfig;
use crate::error::{GenerateError, GenerateResult};
use crate::observer::{GeneratorObserver, NoopObserver};
use crate::parser::{ArchiveParser, PackageParser, ParsedPackage};
use crate::result::{compression_ratio, GenerationResult, Outcome};
use crate::signer::{Ed25519Signer, PatchSigner};
use crate::state::{CancelToken, GeneratorState, StateCell};
use crate::summary::DiffReport;

// ---------------------------------------------------------------------------
// PatchGenerator
// ---------------------------------------------------------------------------

/// Drives parse, diff, pack, and sign for one configured pair of packages.
///
/// One run may be in flight per instance. A second start while a run is
/// active fails immediately with [`ErrorKind::AlreadyRunning`]. Cancellation
/// and the optional timeout are checked between stages only.
pub struct PatchGenerator {
    config: GeneratorConfig,
    parser: Box<dyn PackageParser>,
    differ: CodeDiffer<Box<dyn ContainerCodec>>,
    engines: EngineRegistry,
    signer: Option<Box<dyn PatchSigner>>,
    observer: Arc<dyn GeneratorObserver>,
    cancel: CancelToken,
    running: AtomicBool,
    state: StateCell,
}

impl PatchGenerator {
    /// Validate `config` and build a generator with the default parser,
    /// codec, and engines.
    pub fn new(config: GeneratorConfig) -> GenerateResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            parser: Box::new(ArchiveParser::new()),
            differ: CodeDiffer::new(Box::new(BincodeCodec)),
            engines: EngineRegistry::new(),
            signer: None,
            observer: Arc::new(NoopObserver),
            cancel: CancelToken::new(),
            running: AtomicBool::new(false),
            state: StateCell::new(),
        })
    }

    pub fn with_parser(mut self, parser: impl PackageParser + 'static) -> Self {
        self.parser = Box::new(parser);
        self
    }

    pub fn with_codec(mut self, codec: impl ContainerCodec + 'static) -> Self {
        self.differ = CodeDiffer::new(Box::new(codec));
        self
    }

    pub fn with_engines(mut self, engines: EngineRegistry) -> Self {
        self.engines = engines;
        self
    }

    /// Use `signer` instead of loading the configured key file.
    pub fn with_signer(mut self, signer: impl PatchSigner + 'static) -> Self {
        self.signer = Some(Box::new(signer));
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn GeneratorObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Request cancellation of the current run.
    pub fn cancel(&self) {
        self.cancel.cancel();
        self.engines.cancel_all();
    }

    pub fn state(&self) -> GeneratorState {
        self.state.get()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run to completion on the calling thread.
    pub fn generate(&self) -> GenerationResult {
        if !self.try_claim() {
            return self.rejected();
        }
        self.run_claimed()
    }

    /// Run on tokio's blocking pool. The run is claimed before this returns,
    /// so a second `spawn` or `generate` fails at once.
    pub fn spawn(self: Arc<Self>) -> GenerateResult<JoinHandle<GenerationResult>> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| GenerateError::NoRuntime(e.to_string()))?;
        if !self.try_claim() {
            return Err(GenerateError::AlreadyRunning);
        }
        Ok(runtime.spawn_blocking(move || self.run_claimed()))
    }

    fn try_claim(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn rejected(&self) -> GenerationResult {
        let err = GenerateError::AlreadyRunning;
        warn!("generation rejected: already running");
        self.observer.on_error(err.kind(), &err.to_string());
        GenerationResult::from_error(&err)
    }

    fn run_claimed(&self) -> GenerationResult {
        let started = Instant::now();
        let mut run = RunRecord::default();
        info!(
            base = %self.config.base_package.display(),
            new = %self.config.new_package.display(),
            output = %self.config.output.display(),
            mode = %self.config.settings.mode,
            "generation started"
        );

        let mut result = match self.pipeline(&mut run, started) {
            Ok(result) => {
                self.state.set(GeneratorState::Completed);
                result
            }
            Err(err) => {
                run.discard_outputs();
                let err = if self.cancel.is_cancelled() {
                    GenerateError::Cancelled
                } else {
                    err
                };
                if err.kind() == ErrorKind::Cancelled {
                    info!("generation cancelled");
                    self.state.set(GeneratorState::Cancelled);
                } else {
                    warn!(kind = %err.kind(), error = %err, "generation failed");
                    self.state.set(GeneratorState::Failed);
                    self.observer.on_error(err.kind(), &err.to_string());
                }
                let mut failed = GenerationResult::from_error(&err);
                failed.summary = run.summary.take().unwrap_or_default();
                failed.base_size = run.base_size;
                failed.new_size = run.new_size;
                failed
            }
        };
        result.elapsed = started.elapsed();

        self.observer.on_complete(&result);
        self.cancel.reset();
        self.engines.reset_all();
        self.running.store(false, Ordering::SeqCst);
        result
    }

    // -----------------------------------------------------------------------
    // Pipeline
    // -----------------------------------------------------------------------

    fn pipeline(&self, run: &mut RunRecord, started: Instant) -> GenerateResult<GenerationResult> {
        let deadline = self.config.timeout().map(|limit| (started + limit, limit));

        let stage = self.enter(GeneratorState::Validating, deadline)?;
        let signer = self.validate()?;
        let work = WorkDir::create(self.config.settings.work_dir.as_deref())?;
        self.leave(stage);

        let stage = self.enter(GeneratorState::Parsing, deadline)?;
        let base = self.parser.parse(&self.config.base_package, &work.path().join("base"))?;
        let new = self.parser.parse(&self.config.new_package, &work.path().join("new"))?;
        run.base_size = base.size;
        run.new_size = new.size;
        if !base.version.same_package(&new.version) {
            return Err(GenerateError::VersionMismatch {
                base: base.version.to_string(),
                new: new.version.to_string(),
            });
        }
        if new.version.version_code <= base.version.version_code {
            warn!(
                base = %base.version,
                new = %new.version,
                "new version code does not increase"
            );
        }
        self.leave(stage);

        let stage = self.enter(GeneratorState::Diffing, deadline)?;
        let pairs = ContainerPairs::collect(&base, &new)?;
        let report = self.diff(&pairs, &base, &new)?;
        let summary = report.summary();
        run.summary = Some(summary.clone());
        info!(%summary, "diff complete");
        self.leave(stage);

        if !report.has_changes() {
            info!("no changes between packages, skipping pack");
            let mut result = GenerationResult::new(Outcome::NoChanges);
            result.summary = summary;
            result.base_size = run.base_size;
            result.new_size = run.new_size;
            return Ok(result);
        }

        let stage = self.enter(GeneratorState::Packing, deadline)?;
        let content = self.build_content(&report, &pairs, &base, &new, work.path())?;
        let packed = PatchPacker::new().pack(&content, &self.config.output)?;
        run.written = Some(self.config.output.clone());
        let mut manifest = packed.manifest;
        self.leave(stage);

        let signed = match signer {
            Some(signer) => {
                let stage = self.enter(GeneratorState::Signing, deadline)?;
                signer.sign(&self.config.output)?;
                let digests = ContainerDigests::compute_file(&self.config.output).map_err(|e| {
                    GenerateError::io(ErrorKind::FileReadFailed, &self.config.output, e)
                })?;
                manifest = manifest.with_digests(digests);
                self.leave(stage);
                true
            }
            None => false,
        };

        self.checkpoint(deadline)?;
        if self.config.settings.write_sidecar_manifest {
            let sidecar = self.config.sidecar_path();
            run.sidecar = Some(sidecar.clone());
            fs::write(&sidecar, manifest.to_json_pretty()?)
                .map_err(|e| GenerateError::io(ErrorKind::FileWriteFailed, &sidecar, e))?;
        }

        let mut result = GenerationResult::new(Outcome::Completed);
        result.patch_path = Some(self.config.output.clone());
        result.patch_size = manifest.file_size;
        result.compression_ratio = compression_ratio(manifest.file_size, run.new_size);
        result.manifest = Some(manifest);
        result.summary = summary;
        result.base_size = run.base_size;
        result.new_size = run.new_size;
        result.signed = signed;
        info!(
            path = %self.config.output.display(),
            size = result.patch_size,
            ratio = result.compression_ratio,
            signed,
            "patch generated"
        );
        Ok(result)
    }

    /// Input existence, output directory, and signing key.
    fn validate(&self) -> GenerateResult<Option<SignerRef<'_>>> {
        for input in [&self.config.base_package, &self.config.new_package] {
            if !input.exists() {
                return Err(GenerateError::InputNotFound(input.clone()));
            }
        }
        if let Some(parent) = self.config.output.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| GenerateError::io(ErrorKind::FileWriteFailed, parent, e))?;
            }
        }

        if let Some(signer) = &self.signer {
            return Ok(Some(SignerRef::Borrowed(&**signer)));
        }
        match &self.config.settings.signing_key {
            Some(path) => Ok(Some(SignerRef::Owned(Ed25519Signer::from_key_file(path)?))),
            None => Ok(None),
        }
    }

    fn diff(
        &self,
        pairs: &ContainerPairs,
        base: &ParsedPackage,
        new: &ParsedPackage,
    ) -> GenerateResult<DiffReport> {
        let names = pairs.names();
        let total = names.len();
        let mut code = Vec::with_capacity(total);
        for (index, name) in names.iter().enumerate() {
            let base_bytes = read_optional(pairs.base.get(name))?;
            let new_bytes = read_optional(pairs.new.get(name))?;
            let diff = self
                .differ
                .compare_bytes(name, base_bytes.as_deref(), new_bytes.as_deref())?;
            self.observer.on_compare_progress(name, index + 1, total);
            code.push(diff);
        }

        Ok(DiffReport {
            code,
            resources: diff_directories(&base.resources_dir(), &new.resources_dir())?,
            resource_table: table_change(base.resource_table(), new.resource_table())?,
            assets: diff_directories(&base.assets_dir(), &new.assets_dir())?,
        })
    }

    fn build_content(
        &self,
        report: &DiffReport,
        pairs: &ContainerPairs,
        base: &ParsedPackage,
        new: &ParsedPackage,
        work: &Path,
    ) -> GenerateResult<PackageContent> {
        let settings = &self.config.settings;
        let manifest = PatchManifest::new(
            PatchId::new().to_string(),
            &base.version,
            &new.version,
            settings.mode,
        )
        .with_description(settings.description.clone())
        .with_changes(report.change_list());
        let mut content = PackageContent::new(manifest);

        let mut engine_slot: Option<Arc<dyn ByteDiffEngine>> = None;
        for diff in report.code.iter().filter(|d| d.has_changes()) {
            let new_path = pairs.new.get(&diff.container);
            match settings.mode {
                PatchMode::FullCodeSelection => {
                    let new_bytes = read_optional(new_path)?;
                    if let Some(bytes) = self.differ.build_reduced(diff, new_bytes.as_deref())? {
                        content = content.with_code_container(Artifact::from_bytes(
                            diff.container.clone(),
                            bytes,
                        ));
                    }
                }
                PatchMode::ByteDiff => {
                    let (Some(base_path), Some(new_path)) = (pairs.base.get(&diff.container), new_path)
                    else {
                        if let Some(path) = new_path {
                            content = content
                                .with_code_container(Artifact::from_file(diff.container.clone(), path));
                        }
                        continue;
                    };
                    let engine = match engine_slot.clone() {
                        Some(engine) => engine,
                        None => {
                            let selected = self.engines.select(settings.engine)?;
                            engine_slot = Some(Arc::clone(&selected));
                            selected
                        }
                    };
                    let delta = self.byte_diff(engine.as_ref(), diff, base_path, new_path)?;
                    content = content
                        .with_byte_diff(Artifact::from_bytes(format!("{}.delta", diff.container), delta));
                }
            }
        }

        let stage = work.join("stage");
        if let Some(dir) = stage_tree(&report.resources, &new.resources_dir(), &stage.join("res"))? {
            content = content.with_resources(dir);
        }
        if report.ships_resource_table() {
            if let Some(table) = new.resource_table() {
                content = content.with_resource_table(ArtifactSource::File(table));
            }
        }
        if let Some(dir) = stage_tree(&report.assets, &new.assets_dir(), &stage.join("assets"))? {
            content = content.with_assets(dir);
        }
        Ok(content)
    }

    fn byte_diff(
        &self,
        engine: &dyn ByteDiffEngine,
        diff: &ClassDiff,
        base_path: &Path,
        new_path: &Path,
    ) -> GenerateResult<Vec<u8>> {
        let old = fs::read(base_path)
            .map_err(|e| GenerateError::io(ErrorKind::FileReadFailed, base_path, e))?;
        let new = fs::read(new_path)
            .map_err(|e| GenerateError::io(ErrorKind::FileReadFailed, new_path, e))?;
        let name = diff.container.as_str();
        let progress = |done: u64, total: u64| {
            trace!(container = name, done, total, "byte diff progress");
        };
        let delta = engine.diff(&old, &new, &progress)?;
        debug!(
            container = name,
            engine = engine.name(),
            old = old.len(),
            new = new.len(),
            delta = delta.len(),
            "byte diff built"
        );
        if self.config.settings.verify_byte_diff {
            let rebuilt = engine.apply(&old, &delta, &no_progress)?;
            if rebuilt != new {
                return Err(GenerateError::DeltaMismatch(diff.container.clone()));
            }
        }
        Ok(delta)
    }

    // -----------------------------------------------------------------------
    // Stage boundaries
    // -----------------------------------------------------------------------

    fn enter(
        &self,
        stage: GeneratorState,
        deadline: Option<(Instant, Duration)>,
    ) -> GenerateResult<StageClock> {
        self.checkpoint(deadline)?;
        self.state.set(stage);
        debug!(%stage, "stage started");
        self.observer.on_stage_started(stage);
        Ok(StageClock {
            stage,
            started: Instant::now(),
        })
    }

    fn leave(&self, clock: StageClock) {
        let elapsed = clock.started.elapsed();
        debug!(stage = %clock.stage, elapsed_ms = elapsed.as_millis() as u64, "stage finished");
        self.observer.on_stage_finished(clock.stage, elapsed);
    }

    fn checkpoint(&self, deadline: Option<(Instant, Duration)>) -> GenerateResult<()> {
        if self.cancel.is_cancelled() {
            return Err(GenerateError::Cancelled);
        }
        if let Some((at, limit)) = deadline {
            if Instant::now() >= at {
                return Err(GenerateError::Timeout(limit.as_secs()));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for PatchGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatchGenerator")
            .field("config", &self.config)
            .field("state", &self.state.get())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct StageClock {
    stage: GeneratorState,
    started: Instant,
}

/// Files a run may have produced, removed when the run does not complete.
#[derive(Default)]
struct RunRecord {
    base_size: u64,
    new_size: u64,
    summary: Option<hotpatch_types::ChangeSummary>,
    written: Option<PathBuf>,
    sidecar: Option<PathBuf>,
}

impl RunRecord {
    fn discard_outputs(&mut self) {
        for path in [self.written.take(), self.sidecar.take()].into_iter().flatten() {
            match fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "removed partial output"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "cannot remove output"),
            }
        }
    }
}

enum SignerRef<'a> {
    Borrowed(&'a dyn PatchSigner),
    Owned(Ed25519Signer),
}

impl SignerRef<'_> {
    fn sign(&self, patch: &Path) -> GenerateResult<()> {
        match self {
            Self::Borrowed(signer) => signer.sign(patch)?,
            Self::Owned(signer) => signer.sign(patch)?,
        };
        Ok(())
    }
}

/// Private per-run working directory, removed when dropped.
struct WorkDir {
    dir: Option<TempDir>,
}

impl WorkDir {
    fn create(parent: Option<&Path>) -> GenerateResult<Self> {
        let parent = parent.map_or_else(std::env::temp_dir, Path::to_path_buf);
        fs::create_dir_all(&parent)
            .map_err(|e| GenerateError::io(ErrorKind::FileWriteFailed, &parent, e))?;
        let dir = tempfile::Builder::new()
            .prefix("hotpatch-work-")
            .tempdir_in(&parent)
            .map_err(|e| GenerateError::io(ErrorKind::FileWriteFailed, &parent, e))?;
        debug!(path = %dir.path().display(), "working directory created");
        Ok(Self { dir: Some(dir) })
    }

    fn path(&self) -> &Path {
        self.dir.as_ref().map_or(Path::new(""), TempDir::path)
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => debug!(path = %path.display(), "working directory removed"),
                Err(e) => warn!(path = %path.display(), error = %e, "cannot remove working directory"),
            }
        }
    }
}

/// Code containers of both sides, keyed by file name.
struct ContainerPairs {
    base: BTreeMap<String, PathBuf>,
    new: BTreeMap<String, PathBuf>,
}

impl ContainerPairs {
    fn collect(base: &ParsedPackage, new: &ParsedPackage) -> GenerateResult<Self> {
        Ok(Self {
            base: base.code_containers()?,
            new: new.code_containers()?,
        })
    }

    /// Every container name present on either side.
    fn names(&self) -> BTreeSet<String> {
        self.base.keys().chain(self.new.keys()).cloned().collect()
    }
}

fn read_optional(path: Option<&PathBuf>) -> GenerateResult<Option<Vec<u8>>> {
    path.map(|p| fs::read(p).map_err(|e| GenerateError::io(ErrorKind::FileReadFailed, p, e)))
        .transpose()
}

/// Compare the two resource tables by content hash.
fn table_change(base: Option<PathBuf>, new: Option<PathBuf>) -> GenerateResult<Option<TreeChange>> {
    let side = |path: Option<PathBuf>| -> GenerateResult<BTreeMap<String, FileEntry>> {
        let mut map = BTreeMap::new();
        if let Some(path) = path {
            let (hash, size) = ContentHasher::FILE
                .hash_file(&path)
                .map_err(|e| GenerateError::io(ErrorKind::FileReadFailed, &path, e))?;
            let name = RESOURCE_TABLE_ENTRY.to_string();
            map.insert(name.clone(), FileEntry { path: name, hash, size });
        }
        Ok(map)
    };
    let diff = diff_entries(&side(base)?, &side(new)?);
    Ok(diff.changes.into_iter().next())
}

/// Copy the added and modified files of `diff` from `source` into `dest`.
/// Returns `None` when nothing ships.
fn stage_tree(diff: &TreeDiff, source: &Path, dest: &Path) -> GenerateResult<Option<PathBuf>> {
    let paths = diff.paths_to_ship();
    if paths.is_empty() {
        return Ok(None);
    }
    for relative in paths {
        let from = source.join(relative);
        let to = dest.join(relative);
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| GenerateError::io(ErrorKind::FileWriteFailed, parent, e))?;
        }
        fs::copy(&from, &to).map_err(|e| GenerateError::io(ErrorKind::FileReadFailed, &from, e))?;
    }
    Ok(Some(dest.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{ChannelObserver, GeneratorEvent};
    use crate::parser::PACKAGE_INFO;
    use crate::signer::verify_container;
    use crate::testutil::{class, write_dir_package, write_zip_package, PackageSpec};
    use hotpatch_crypto::SigningKey;
    use hotpatch_delta::PrimaryEngine;
    use hotpatch_pack::{PatchReader, Storage};
    use hotpatch_types::{EngineKind, VersionInfo};

    const CONTAINER: &str = "classes.dex";

    fn base_spec() -> PackageSpec {
        PackageSpec::new("com.example.app", "1.0.0", 100)
            .container(
                CONTAINER,
                vec![
                    class("com.x.A", 0x12),
                    class("com.x.A$1", 0x20),
                    class("com.x.B", 0x12),
                    class("com.x.C", 0x12),
                ],
            )
            .file("res/values/strings.xml", b"<resources>v1</resources>")
            .file("res/layout/main.xml", b"<layout/>")
            .file("resources.arsc", b"table-v1")
            .file("assets/old.txt", b"old")
            .file("assets/same.txt", b"same")
    }

    fn new_spec() -> PackageSpec {
        base_spec()
            .version("1.1.0", 101)
            .container(
                CONTAINER,
                vec![
                    class("com.x.A", 0x13),
                    class("com.x.A$1", 0x20),
                    class("com.x.B", 0x12),
                    class("com.x.D", 0x12),
                ],
            )
            .file("res/values/strings.xml", b"<resources>v2</resources>")
            .file("resources.arsc", b"table-v2")
            .without("assets/old.txt")
            .file("assets/new.txt", b"new")
    }

    struct Fixture {
        dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new(base: &PackageSpec, new: &PackageSpec) -> Self {
            let dir = tempfile::tempdir().unwrap();
            write_dir_package(&dir.path().join("base"), base);
            write_dir_package(&dir.path().join("new"), new);
            Self { dir }
        }

        fn path(&self, rel: &str) -> PathBuf {
            self.dir.path().join(rel)
        }

        fn output(&self) -> PathBuf {
            self.path("out/patch.zip")
        }

        fn config(&self) -> GeneratorConfig {
            GeneratorConfig::new(self.path("base"), self.path("new"), self.output())
                .with_work_dir(self.path("work"))
        }

        fn work_is_clean(&self) -> bool {
            fs::read_dir(self.path("work"))
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(true)
        }
    }

    fn identifiers(bytes: &[u8]) -> Vec<String> {
        BincodeCodec.decode(CONTAINER, bytes).unwrap().identifiers()
    }

    struct CancelAfter {
        token: CancelToken,
        stage: GeneratorState,
    }

    impl GeneratorObserver for CancelAfter {
        fn on_stage_finished(&self, stage: GeneratorState, _elapsed: Duration) {
            if stage == self.stage {
                self.token.cancel();
            }
        }
    }

    /// Blocks parsing until released.
    struct GatedParser {
        entered: Arc<AtomicBool>,
        release: Arc<AtomicBool>,
    }

    impl PackageParser for GatedParser {
        fn parse(&self, input: &Path, scratch: &Path) -> crate::error::ParseResult<ParsedPackage> {
            self.entered.store(true, Ordering::SeqCst);
            while !self.release.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(5));
            }
            ArchiveParser.parse(input, scratch)
        }
    }

    /// Deletes an input file as soon as packing starts.
    struct RemoveOnPacking(PathBuf);

    impl GeneratorObserver for RemoveOnPacking {
        fn on_stage_started(&self, stage: GeneratorState) {
            if stage == GeneratorState::Packing {
                fs::remove_file(&self.0).unwrap();
            }
        }
    }

    struct SlowParser(Duration);

    impl PackageParser for SlowParser {
        fn parse(&self, input: &Path, scratch: &Path) -> crate::error::ParseResult<ParsedPackage> {
            std::thread::sleep(self.0);
            ArchiveParser.parse(input, scratch)
        }
    }

    #[test]
    fn identical_packages_need_no_patch() {
        let fx = Fixture::new(&base_spec(), &base_spec().version("1.0.1", 101));
        let generator = PatchGenerator::new(fx.config()).unwrap();
        let result = generator.generate();

        assert_eq!(result.outcome, Outcome::NoChanges);
        assert!(result.is_success());
        assert!(!result.has_changes());
        assert_eq!(result.exit_code(), 0);
        assert!(result.patch_path.is_none());
        assert!(!fx.output().exists());
        assert!(!fx.path("out/patch.zip.json").exists());
        assert_eq!(generator.state(), GeneratorState::Completed);
        assert!(fx.work_is_clean());
    }

    #[test]
    fn class_level_patch_ships_changed_classes_and_closure() {
        let fx = Fixture::new(&base_spec(), &new_spec());
        let generator = PatchGenerator::new(fx.config()).unwrap();
        let result = generator.generate();

        assert_eq!(result.outcome, Outcome::Completed, "{:?}", result.message());
        assert!(result.has_changes());
        assert_eq!(result.summary.code_modified, 1);
        assert_eq!(result.summary.code_added, 1);
        assert_eq!(result.summary.code_deleted, 1);
        assert_eq!(result.summary.resources_modified, 2);
        assert_eq!(result.summary.assets_added, 1);
        assert_eq!(result.summary.assets_deleted, 1);
        assert!(result.compression_ratio > 0.0);

        let manifest = result.manifest.clone().unwrap();
        assert_eq!(manifest.changes.code.modified, vec!["com.x.A"]);
        assert_eq!(manifest.changes.code.added, vec!["com.x.D"]);
        assert_eq!(manifest.changes.code.deleted, vec!["com.x.C"]);
        assert_eq!(manifest.base_version, "1.0.0");
        assert_eq!(manifest.target_version_code, 101);
        assert_eq!(manifest.digests(), ContainerDigests::compute_file(&fx.output()).unwrap());

        let mut reader = PatchReader::open(&fx.output()).unwrap();
        let names = reader.entry_names().unwrap();
        assert_eq!(
            names,
            vec![
                "patch.json",
                "classes.dex",
                "res/values/strings.xml",
                "resources.arsc",
                "assets/new.txt",
            ]
        );
        assert_eq!(reader.storage_of("resources.arsc").unwrap(), Some(Storage::Stored));
        assert_eq!(
            identifiers(&reader.read_entry(CONTAINER).unwrap()),
            vec!["com.x.A", "com.x.A$1", "com.x.D"]
        );
        assert_eq!(reader.manifest().unwrap().patch_id, manifest.patch_id);

        let sidecar = fs::read(fx.path("out/patch.zip.json")).unwrap();
        assert_eq!(PatchManifest::from_json(&sidecar).unwrap(), manifest);
        assert!(fx.work_is_clean());
    }

    #[test]
    fn whole_containers_ship_verbatim_or_not_at_all() {
        let base = base_spec().container("classes3.dex", vec![class("com.y.Extra", 0x12)]);
        let new = base_spec()
            .version("1.1.0", 101)
            .container("classes2.dex", vec![class("com.z.New", 0x12)]);
        let fx = Fixture::new(&base, &new);
        let result = PatchGenerator::new(fx.config()).unwrap().generate();
        assert_eq!(result.outcome, Outcome::Completed, "{:?}", result.message());
        assert_eq!(result.summary.code_added, 1);
        assert_eq!(result.summary.code_deleted, 1);

        let manifest = result.manifest.unwrap();
        assert_eq!(manifest.changes.code_containers.added, vec!["classes2.dex"]);
        assert_eq!(manifest.changes.code_containers.deleted, vec!["classes3.dex"]);
        assert!(manifest.changes.code.added.is_empty());

        let mut reader = PatchReader::open(&fx.output()).unwrap();
        let names = reader.entry_names().unwrap();
        assert_eq!(names, vec!["patch.json", "classes2.dex"]);
        assert_eq!(
            reader.read_entry("classes2.dex").unwrap(),
            fs::read(fx.path("new/classes2.dex")).unwrap()
        );
    }

    #[test]
    fn cancel_after_diffing_leaves_no_output() {
        let fx = Fixture::new(&base_spec(), &new_spec());
        let generator = PatchGenerator::new(fx.config()).unwrap();
        let observer = CancelAfter {
            token: generator.cancel_token(),
            stage: GeneratorState::Diffing,
        };
        let generator = generator.with_observer(Arc::new(observer));

        let result = generator.generate();
        assert_eq!(result.outcome, Outcome::Cancelled);
        assert_eq!(result.error_kind(), Some(ErrorKind::Cancelled));
        assert!(result.summary.has_changes());
        assert!(!fx.output().exists());
        assert_eq!(generator.state(), GeneratorState::Cancelled);
        assert!(!generator.is_running());
        assert!(!generator.cancel_token().is_cancelled());
        assert!(fx.work_is_clean());
    }

    #[test]
    fn cancel_after_packing_removes_written_patch() {
        let fx = Fixture::new(&base_spec(), &new_spec());
        let key = fx.path("signing.key");
        fs::write(&key, SigningKey::generate().to_hex()).unwrap();
        let generator = PatchGenerator::new(fx.config().with_signing_key(&key)).unwrap();
        let observer = CancelAfter {
            token: generator.cancel_token(),
            stage: GeneratorState::Packing,
        };
        let result = generator.with_observer(Arc::new(observer)).generate();
        assert_eq!(result.outcome, Outcome::Cancelled);
        assert!(!fx.output().exists());
        assert!(!fx.path("out/patch.zip.json").exists());
    }

    #[test]
    fn generator_is_reusable_after_cancel() {
        let fx = Fixture::new(&base_spec(), &new_spec());
        let generator = PatchGenerator::new(fx.config()).unwrap();
        generator.cancel();
        assert_eq!(generator.generate().outcome, Outcome::Cancelled);
        let again = generator.generate();
        assert_eq!(again.outcome, Outcome::Completed, "{:?}", again.message());
    }

    #[tokio::test]
    async fn concurrent_start_is_rejected() {
        let fx = Fixture::new(&base_spec(), &new_spec());
        let entered = Arc::new(AtomicBool::new(false));
        let release = Arc::new(AtomicBool::new(false));
        let parser = GatedParser {
            entered: Arc::clone(&entered),
            release: Arc::clone(&release),
        };
        let generator = Arc::new(PatchGenerator::new(fx.config()).unwrap().with_parser(parser));

        let handle = Arc::clone(&generator).spawn().unwrap();
        while !entered.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(generator.is_running());
        assert_eq!(generator.state(), GeneratorState::Parsing);
        assert!(matches!(
            Arc::clone(&generator).spawn(),
            Err(GenerateError::AlreadyRunning)
        ));
        let second = generator.generate();
        assert_eq!(second.error_kind(), Some(ErrorKind::AlreadyRunning));

        release.store(true, Ordering::SeqCst);
        let first = handle.await.unwrap();
        assert_eq!(first.outcome, Outcome::Completed, "{:?}", first.message());
        assert!(!generator.is_running());
    }

    #[tokio::test]
    async fn spawned_run_reports_stages_through_channel() {
        let fx = Fixture::new(&base_spec(), &new_spec());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let generator = Arc::new(
            PatchGenerator::new(fx.config())
                .unwrap()
                .with_observer(Arc::new(ChannelObserver::new(tx))),
        );
        let result = generator.spawn().unwrap().await.unwrap();
        assert!(result.is_success());

        let mut started = Vec::new();
        let mut progress = 0;
        let mut completed = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                GeneratorEvent::StageStarted(stage) => started.push(stage),
                GeneratorEvent::CompareProgress { .. } => progress += 1,
                GeneratorEvent::Complete(result) => completed = result.is_success(),
                _ => {}
            }
        }
        assert_eq!(
            started,
            vec![
                GeneratorState::Validating,
                GeneratorState::Parsing,
                GeneratorState::Diffing,
                GeneratorState::Packing,
            ]
        );
        assert_eq!(progress, 1);
        assert!(completed);
    }

    #[test]
    fn byte_diff_mode_ships_verified_deltas() {
        let fx = Fixture::new(&base_spec(), &new_spec());
        let config = fx.config().with_mode(PatchMode::ByteDiff).with_engine(EngineKind::Primary);
        let result = PatchGenerator::new(config).unwrap().generate();
        assert_eq!(result.outcome, Outcome::Completed, "{:?}", result.message());
        assert_eq!(result.manifest.as_ref().unwrap().patch_mode, PatchMode::ByteDiff);

        let mut reader = PatchReader::open(&fx.output()).unwrap();
        let names = reader.entry_names().unwrap();
        assert!(names.contains(&"classes.dex.delta".to_string()));
        assert!(!names.contains(&CONTAINER.to_string()));

        let delta = reader.read_entry("classes.dex.delta").unwrap();
        let old = fs::read(fx.path("base/classes.dex")).unwrap();
        let rebuilt = PrimaryEngine::new().apply(&old, &delta, &no_progress).unwrap();
        assert_eq!(rebuilt, fs::read(fx.path("new/classes.dex")).unwrap());
    }

    #[test]
    fn failed_pack_keeps_existing_output() {
        let new = new_spec().container("classes2.dex", vec![class("com.z.New", 0x12)]);
        let fx = Fixture::new(&base_spec(), &new);
        fs::create_dir_all(fx.path("out")).unwrap();
        fs::write(fx.output(), b"previous patch").unwrap();

        let config = fx.config().with_mode(PatchMode::ByteDiff).with_engine(EngineKind::Primary);
        let observer = RemoveOnPacking(fx.path("new/classes2.dex"));
        let result = PatchGenerator::new(config)
            .unwrap()
            .with_observer(Arc::new(observer))
            .generate();

        assert!(matches!(result.outcome, Outcome::Failed { .. }), "{:?}", result.outcome);
        assert_eq!(fs::read(fx.output()).unwrap(), b"previous patch");
        assert!(!fx.path("out/patch.zip.json").exists());
        assert!(fx.work_is_clean());
    }

    #[test]
    fn missing_native_engine_fails_byte_diff() {
        let fx = Fixture::new(&base_spec(), &new_spec());
        let config = fx
            .config()
            .with_mode(PatchMode::ByteDiff)
            .with_engine(EngineKind::NativeAccelerated);
        let result = PatchGenerator::new(config).unwrap().generate();
        assert_eq!(result.error_kind(), Some(ErrorKind::ByteDiffEngineUnavailable));
        assert!(!fx.output().exists());
    }

    #[test]
    fn signed_patch_verifies_and_digests_cover_signature() {
        let fx = Fixture::new(&base_spec(), &new_spec());
        let key = SigningKey::generate();
        let key_path = fx.path("signing.key");
        fs::write(&key_path, key.to_hex()).unwrap();

        let generator = PatchGenerator::new(fx.config().with_signing_key(&key_path)).unwrap();
        let result = generator.generate();
        assert_eq!(result.outcome, Outcome::Completed, "{:?}", result.message());
        assert!(result.signed);

        verify_container(&fx.output(), &key.verifying_key()).unwrap();
        let manifest = result.manifest.unwrap();
        assert_eq!(manifest.digests(), ContainerDigests::compute_file(&fx.output()).unwrap());
        assert_eq!(result.patch_size, fs::metadata(fx.output()).unwrap().len());
    }

    #[test]
    fn invalid_signing_key_fails_before_work() {
        let fx = Fixture::new(&base_spec(), &new_spec());
        let key_path = fx.path("signing.key");
        fs::write(&key_path, "zz").unwrap();
        let result = PatchGenerator::new(fx.config().with_signing_key(&key_path))
            .unwrap()
            .generate();
        assert_eq!(result.error_kind(), Some(ErrorKind::SigningKeyInvalid));
        assert!(!fx.output().exists());
    }

    #[test]
    fn different_packages_are_a_version_mismatch() {
        let other = PackageSpec {
            info: VersionInfo::new("com.other", "2.0", 2),
            ..new_spec()
        };
        let fx = Fixture::new(&base_spec(), &other);
        let generator = PatchGenerator::new(fx.config()).unwrap();
        let result = generator.generate();
        assert_eq!(result.error_kind(), Some(ErrorKind::VersionMismatch));
        assert_eq!(generator.state(), GeneratorState::Failed);
        assert!(fx.work_is_clean());
    }

    #[test]
    fn missing_input_is_file_not_found() {
        let fx = Fixture::new(&base_spec(), &new_spec());
        let config = GeneratorConfig::new(fx.path("missing"), fx.path("new"), fx.output());
        let result = PatchGenerator::new(config).unwrap().generate();
        assert_eq!(result.error_kind(), Some(ErrorKind::FileNotFound));
        assert_ne!(result.exit_code(), 0);
    }

    #[test]
    fn malformed_container_is_a_code_unit_failure() {
        let fx = Fixture::new(&base_spec(), &new_spec().file(CONTAINER, b"garbage"));
        let result = PatchGenerator::new(fx.config()).unwrap().generate();
        assert_eq!(result.error_kind(), Some(ErrorKind::CodeUnitParseFailed));
        assert!(!fx.output().exists());
    }

    #[test]
    fn missing_metadata_is_reported() {
        let fx = Fixture::new(&base_spec(), &new_spec());
        fs::remove_file(fx.path("new").join(PACKAGE_INFO)).unwrap();
        let result = PatchGenerator::new(fx.config()).unwrap().generate();
        assert_eq!(result.error_kind(), Some(ErrorKind::MetadataParseFailed));
    }

    #[test]
    fn zip_packages_are_extracted_and_cleaned_up() {
        let fx = Fixture::new(&base_spec(), &new_spec());
        write_zip_package(&fx.path("base.zip"), &base_spec());
        write_zip_package(&fx.path("new.zip"), &new_spec());
        let config = GeneratorConfig::new(fx.path("base.zip"), fx.path("new.zip"), fx.output())
            .with_work_dir(fx.path("work"));
        let result = PatchGenerator::new(config).unwrap().generate();
        assert_eq!(result.outcome, Outcome::Completed, "{:?}", result.message());
        assert_eq!(result.base_size, fs::metadata(fx.path("base.zip")).unwrap().len());
        assert_eq!(result.summary.code_modified, 1);
        assert!(fx.work_is_clean());
    }

    #[test]
    fn timeout_is_checked_between_stages() {
        let fx = Fixture::new(&base_spec(), &new_spec());
        let config = fx.config().with_timeout(Duration::from_secs(1));
        let generator = PatchGenerator::new(config)
            .unwrap()
            .with_parser(SlowParser(Duration::from_millis(600)));
        let result = generator.generate();
        assert_eq!(result.error_kind(), Some(ErrorKind::Timeout));
        assert!(!fx.output().exists());
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let fx = Fixture::new(&base_spec(), &new_spec());
        let config = GeneratorConfig::new(fx.path("base"), fx.path("new"), fx.path("out"));
        fs::create_dir_all(fx.path("out")).unwrap();
        assert!(matches!(
            PatchGenerator::new(config),
            Err(GenerateError::InvalidConfig(_))
        ));
    }
}
