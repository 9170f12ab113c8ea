// src/state.rs

//! The editing session: one project, its model, and the save/evaluate protocol.

use crate::core::evaluator::{EvaluationOutcome, EvaluationRequest};
use crate::core::mutation::{Command, EnvironmentModel, Event, MutationError, MutationResult};
use crate::core::persistence::{
    self, LoadedProject, PersistenceError, PersistenceResult, SavePlan, SaveReport,
};
use crate::core::unify::{self, UnsafeReport};
use crate::models::{ParseWarning, RuntimeContext, ScopeId, VariableId};
use crate::system::facts::{SystemFacts, system_variables};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Mutation(#[from] MutationError),
    #[error("Variable '{0}' is not defined in this project.")]
    UnknownVariable(String),
    #[error("A save is already in progress.")]
    SaveInFlight,
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Represents the state of the model. It holds the current state and,
/// once something asked for mutable access, the snapshot taken before it.
#[derive(Debug)]
enum ModelState {
    Pristine(EnvironmentModel),
    Dirty {
        original: EnvironmentModel,
        current: EnvironmentModel,
    },
}

impl ModelState {
    fn current(&self) -> &EnvironmentModel {
        match self {
            Self::Pristine(model) => model,
            Self::Dirty { current, .. } => current,
        }
    }

    /// Hands out the model for mutation, taking the snapshot on first use.
    fn current_mut(&mut self) -> &mut EnvironmentModel {
        if let Self::Pristine(model) = self {
            let original = model.clone();
            let current = std::mem::take(model);
            *self = Self::Dirty { original, current };
        }
        match self {
            Self::Pristine(model) => model,
            Self::Dirty { current, .. } => current,
        }
    }

    fn needs_saving(&self) -> bool {
        match self {
            Self::Pristine(_) => false,
            Self::Dirty { original, current } => original != current,
        }
    }
}

/// Result of [`Session::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Done(Vec<Event>),
    /// A save is in flight; the command runs once it completes.
    Queued { position: usize },
}

/// A save that has been started and must be finished with [`Session::complete_save`].
#[derive(Debug, Clone, PartialEq)]
pub struct SaveTicket {
    target: PathBuf,
    plan: SavePlan,
    relocate: bool,
}

impl SaveTicket {
    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn plan(&self) -> &SavePlan {
        &self.plan
    }

    /// Performs the disk writes described by the ticket.
    pub fn execute(&self) -> PersistenceResult<SaveReport> {
        persistence::save_project(&self.target, &self.plan)
    }
}

#[derive(Debug)]
pub struct SaveOutcome {
    pub result: PersistenceResult<SaveReport>,
    /// Results of the commands that were queued during the save, in order.
    pub replayed: Vec<MutationResult<Vec<Event>>>,
}

#[derive(Debug)]
pub struct Session {
    project_root: PathBuf,
    context: RuntimeContext,
    state: ModelState,
    warnings: Vec<ParseWarning>,
    saving: bool,
    deferred: VecDeque<Command>,
    next_eval_seq: u64,
    latest_eval: HashMap<VariableId, u64>,
}

impl Session {
    /// Loads the project at `root` with the machine identity from `facts`.
    pub fn open(root: &Path, facts: &impl SystemFacts, default_scope: &str) -> SessionResult<Self> {
        let loaded = persistence::load_project(root)?;
        Ok(Self::from_loaded(root, facts.context(), loaded, default_scope))
    }

    pub fn from_loaded(
        root: &Path,
        context: RuntimeContext,
        loaded: LoadedProject,
        default_scope: &str,
    ) -> Self {
        let LoadedProject {
            etc,
            share,
            mut warnings,
        } = loaded;

        let mut lists: Vec<(ScopeId, Vec<_>)> = Vec::new();
        lists.extend(etc.scopes.into_iter().map(|(name, records)| (ScopeId::etc(name), records)));
        lists.extend(share.scopes.into_iter().map(|(name, records)| (ScopeId::share(name), records)));

        let model = EnvironmentModel::from_parts(
            &context,
            &etc.overlay,
            &share.overlay,
            lists,
            system_variables(&context, root),
        )
        .with_default_scope(default_scope);

        // Scope files without a place in the loading order are kept but never unified.
        for id in model.store().scope_ids() {
            if !model.catalog().contains(id) {
                let layer = persistence::env_dir(root, id.kind);
                warnings.push(ParseWarning {
                    file: layer.join(persistence::scope_file_name(&id.name)),
                    line: 0,
                    message: format!("scope '{}' is not in the loading order and is ignored", id),
                });
            }
        }

        Self {
            project_root: root.to_path_buf(),
            context,
            state: ModelState::Pristine(model),
            warnings,
            saving: false,
            deferred: VecDeque::new(),
            next_eval_seq: 0,
            latest_eval: HashMap::new(),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn context(&self) -> &RuntimeContext {
        &self.context
    }

    pub fn model(&self) -> &EnvironmentModel {
        self.state.current()
    }

    pub fn warnings(&self) -> &[ParseWarning] {
        &self.warnings
    }

    pub fn unsafe_report(&self) -> UnsafeReport {
        unify::unsafe_report(self.model().effective())
    }

    pub fn needs_saving(&self) -> bool {
        self.state.needs_saving()
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Runs a command, or queues it while a save is in flight.
    pub fn apply(&mut self, command: Command) -> SessionResult<Applied> {
        if self.saving {
            log::debug!("Save in flight, deferring {:?}", command);
            self.deferred.push_back(command);
            return Ok(Applied::Queued {
                position: self.deferred.len(),
            });
        }
        let events = self.state.current_mut().apply(command)?;
        Ok(Applied::Done(events))
    }

    // --- Saving ---

    fn start_save(&mut self, target: &Path, relocate: bool) -> SessionResult<SaveTicket> {
        if self.saving {
            return Err(SessionError::SaveInFlight);
        }
        let model = self.model();
        let retired = if relocate {
            Vec::new()
        } else {
            model.retired_scopes().cloned().collect()
        };
        let plan = SavePlan {
            scopes: model.etc_lists(),
            overlay: model.overlay_entries(),
            retired,
        };
        self.saving = true;
        Ok(SaveTicket {
            target: target.to_path_buf(),
            plan,
            relocate,
        })
    }

    /// Starts saving to the project's own directory.
    pub fn begin_save(&mut self) -> SessionResult<SaveTicket> {
        let root = self.project_root.clone();
        self.start_save(&root, false)
    }

    /// Starts saving into another project directory, which becomes the session's project.
    pub fn begin_save_to(&mut self, target: &Path) -> SessionResult<SaveTicket> {
        let relocate = target != self.project_root;
        self.start_save(target, relocate)
    }

    /// Finishes a save and replays whatever was queued meanwhile, success or not.
    pub fn complete_save(&mut self, ticket: SaveTicket, result: PersistenceResult<SaveReport>) -> SaveOutcome {
        self.saving = false;

        if result.is_ok() {
            let mut saved = self.state.current().clone();
            saved.clear_retired();
            if ticket.relocate {
                self.project_root = ticket.target;
                saved.install_system_variables(system_variables(&self.context, &self.project_root));
            }
            self.state = ModelState::Pristine(saved);
        }

        let replayed = std::mem::take(&mut self.deferred)
            .into_iter()
            .map(|command| self.state.current_mut().apply(command))
            .collect();
        SaveOutcome { result, replayed }
    }

    /// Synchronous save to the project directory.
    pub fn save(&mut self) -> SessionResult<SaveOutcome> {
        let ticket = self.begin_save()?;
        let result = ticket.execute();
        Ok(self.complete_save(ticket, result))
    }

    pub fn save_to(&mut self, target: &Path) -> SessionResult<SaveOutcome> {
        let ticket = self.begin_save_to(target)?;
        let result = ticket.execute();
        Ok(self.complete_save(ticket, result))
    }

    // --- Evaluation ---

    /// Prepares an evaluation of `key`. `candidate` replaces the stored value
    /// (for previews while editing), `preview` replaces the machine identity.
    pub fn request_evaluation(
        &mut self,
        key: &str,
        candidate: Option<&str>,
        preview: Option<RuntimeContext>,
    ) -> SessionResult<EvaluationRequest> {
        let model = self.state.current();
        let target = model
            .find_effective(key)
            .ok_or_else(|| SessionError::UnknownVariable(key.to_string()))?;
        let id = target.id();
        let candidate = candidate.unwrap_or(&target.raw_value).to_string();
        let prefix = unify::prefix_before(model.effective(), key).to_vec();

        self.next_eval_seq += 1;
        let seq = self.next_eval_seq;
        self.latest_eval.insert(id.clone(), seq);

        Ok(EvaluationRequest {
            seq,
            target: id,
            candidate,
            prefix,
            context: preview.unwrap_or_else(|| self.context.clone()),
            working_dir: self.project_root.clone(),
        })
    }

    /// Keeps a result only if no newer evaluation was requested for the same variable.
    pub fn accept_evaluation(
        &mut self,
        request: &EvaluationRequest,
        outcome: EvaluationOutcome,
    ) -> Option<EvaluationOutcome> {
        match self.latest_eval.get(&request.target) {
            Some(latest) if *latest == request.seq => Some(outcome),
            _ => {
                log::debug!(
                    "Dropping stale evaluation {} for '{}'",
                    request.seq,
                    request.target
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::evaluator::{self, tests::FakeSandbox};
    use crate::models::ScopeKind;
    use crate::system::facts::StaticFacts;
    use std::fs;
    use tempfile::tempdir;

    fn facts() -> StaticFacts {
        StaticFacts(RuntimeContext::new("linux", "box", "alice"))
    }

    fn project() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        let etc = persistence::env_dir(dir.path(), ScopeKind::Etc);
        fs::create_dir_all(&etc).unwrap();
        fs::write(etc.join("environment-global.sh"), "export FOO=\"bar\"\n").unwrap();
        fs::write(
            etc.join("environment-project.sh"),
            "export FOO=\"baz\"\nexport QUX=\"1\"\nexport LIB=\"${QUX}/lib\"\n",
        )
        .unwrap();
        dir
    }

    fn add(name: &str, value: &str) -> Command {
        Command::AddVariable {
            name: Some(name.to_string()),
            value: value.to_string(),
            scope: None,
            comment: String::new(),
        }
    }

    #[test]
    fn test_open_unifies_and_installs_system_scope() {
        let dir = project();
        let session = Session::open(dir.path(), &facts(), "global").unwrap();

        let foo = session.model().find_effective("FOO").unwrap();
        assert_eq!((foo.scope.as_str(), foo.raw_value.as_str()), ("project", "baz"));
        let uname = session.model().find_effective("MULLE_UNAME").unwrap();
        assert_eq!((uname.kind, uname.raw_value.as_str()), (ScopeKind::System, "linux"));
        assert!(!session.needs_saving());
    }

    #[test]
    fn test_journaling_tracks_real_changes() {
        let dir = project();
        let mut session = Session::open(dir.path(), &facts(), "global").unwrap();

        // A failed command leaves nothing to save.
        assert!(session.apply(add("FOO", "x\\y")).is_err());
        assert!(!session.needs_saving());

        session.apply(add("NEW", "1")).unwrap();
        assert!(session.needs_saving());

        let id = VariableId::new(ScopeId::etc("global"), "NEW");
        session.apply(Command::DeleteVariable(id)).unwrap();
        assert!(!session.needs_saving());
    }

    #[test]
    fn test_mutations_during_save_are_queued_and_replayed() {
        // --- Setup ---
        let dir = project();
        let mut session = Session::open(dir.path(), &facts(), "global").unwrap();
        session.apply(add("FIRST", "1")).unwrap();

        // --- Execute ---
        let ticket = session.begin_save().unwrap();
        assert!(matches!(session.begin_save(), Err(SessionError::SaveInFlight)));
        let queued = session.apply(add("SECOND", "2")).unwrap();
        assert_eq!(queued, Applied::Queued { position: 1 });
        assert!(session.model().find_effective("SECOND").is_none());

        let result = ticket.execute();
        let outcome = session.complete_save(ticket, result);

        // --- Assert ---
        assert!(outcome.result.is_ok());
        assert_eq!(outcome.replayed.len(), 1);
        assert!(session.model().find_effective("SECOND").is_some());
        assert!(session.needs_saving());
        let written = fs::read_to_string(
            persistence::env_dir(dir.path(), ScopeKind::Etc).join("environment-global.sh"),
        )
        .unwrap();
        assert!(written.contains("FIRST"));
        assert!(!written.contains("SECOND"));
    }

    #[test]
    fn test_failed_save_keeps_model_and_still_replays() {
        let dir = project();
        let mut session = Session::open(dir.path(), &facts(), "global").unwrap();
        session.apply(add("FIRST", "1")).unwrap();
        let before = session.model().clone();

        let ticket = session.begin_save().unwrap();
        session.apply(add("SECOND", "2")).unwrap();
        let failure = Err(PersistenceError::ProjectNotFound(PathBuf::from("/gone")));
        let outcome = session.complete_save(ticket, failure);

        assert!(outcome.result.is_err());
        assert!(session.needs_saving());
        assert!(session.model().find_effective("FIRST").is_some());
        assert!(session.model().find_effective("SECOND").is_some());
        assert_ne!(session.model(), &before);
    }

    #[test]
    fn test_save_to_relocates_session() {
        let dir = project();
        let other = tempdir().unwrap();
        let mut session = Session::open(dir.path(), &facts(), "global").unwrap();

        session.save_to(other.path()).unwrap().result.unwrap();

        assert_eq!(session.project_root(), other.path());
        let root = session.model().find_effective("MULLE_VIRTUAL_ROOT").unwrap();
        assert_eq!(root.raw_value, dunce::simplified(other.path()).to_string_lossy());
        assert!(persistence::env_dir(other.path(), ScopeKind::Etc).join("environment-project.sh").exists());
    }

    #[test]
    fn test_stale_evaluations_are_dropped() {
        let dir = project();
        let mut session = Session::open(dir.path(), &facts(), "global").unwrap();

        let first = session.request_evaluation("LIB", None, None).unwrap();
        let second = session.request_evaluation("LIB", Some("${QUX}/other"), None).unwrap();
        assert!(second.seq > first.seq);

        let outcome = EvaluationOutcome::Expanded("x".to_string());
        assert_eq!(session.accept_evaluation(&first, outcome.clone()), None);
        assert_eq!(session.accept_evaluation(&second, outcome.clone()), Some(outcome));
    }

    #[tokio::test]
    async fn test_evaluation_uses_prefix_only() {
        let dir = project();
        let mut session = Session::open(dir.path(), &facts(), "global").unwrap();
        let sandbox = FakeSandbox::default();

        let request = session.request_evaluation("LIB", None, None).unwrap();
        assert!(request.prefix.iter().all(|v| v.key != "LIB"));
        let outcome = evaluator::evaluate(&sandbox, &request).await;

        assert_eq!(
            session.accept_evaluation(&request, outcome),
            Some(EvaluationOutcome::Expanded("1/lib".to_string()))
        );
    }

    #[test]
    fn test_orphan_scope_files_are_reported() {
        let dir = project();
        let etc = persistence::env_dir(dir.path(), ScopeKind::Etc);
        fs::write(etc.join("environment-stray.sh"), "export STRAY=\"1\"\n").unwrap();

        let session = Session::open(dir.path(), &facts(), "global").unwrap();

        assert!(session.model().find_effective("STRAY").is_none());
        assert!(session.warnings().iter().any(|w| w.message.contains("etc:stray")));
        assert!(session.model().store().contains(&ScopeId::etc("stray"), "STRAY"));
    }
}
