use clap::{Parser, Subcommand, ValueEnum};
use lift_core::app_state::{self, get_or_init_app_state};
use lift_core::history::{export_history_csv, list_history, soft_delete_workout, update_completed_workout};
use lift_core::lifecycle::{
    abandon_active_workout, complete_active_workout, ensure_progression_seed, get_active_workout,
    parse_work_weight, start_or_resume_workout, switch_variation, tap_set, update_preferred_bar,
    update_progression_increment, update_work_weight,
};
use lift_core::plates::{compute_inventory_stack, compute_stack, PlateLoad};
use lift_core::program::{
    bar_type, seed_exercise_definitions, seed_progression_states, stronglifts_5x5,
    DEFAULT_BAR_TYPE_ID,
};
use lift_core::stopwatch::{poll_stopwatch, StopwatchPhase};
use lift_core::*;
use std::collections::HashMap;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "lift5x5")]
#[command(about = "5x5 barbell training tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// More log output on stderr (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a workout, or resume the active one
    Start,

    /// Show the active workout (default)
    Show,

    /// Tap a set: done, then one rep less each tap, then back to pending
    Tap {
        /// Exercise number as shown by `show`
        exercise: usize,
        /// Set number within the exercise
        set: usize,
    },

    /// Change the working weight of an exercise in the active workout
    Weight {
        exercise: usize,
        value: String,
    },

    /// Rebuild the active workout as variation A or B
    Switch {
        #[arg(value_enum, ignore_case = true)]
        variation: VariationArg,
    },

    /// Complete the active workout and update progression
    Complete,

    /// Discard the active workout
    Abandon,

    /// List completed workouts, newest first
    History {
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Correct a set in a completed workout
    Edit {
        /// Workout id or unique prefix
        workout_id: String,
        exercise: usize,
        set: usize,
        #[arg(long, value_enum)]
        status: StatusArg,
        #[arg(long)]
        reps: Option<u32>,
    },

    /// Delete a completed workout from history
    Delete {
        /// Workout id or unique prefix
        workout_id: String,
    },

    /// Suggest plates for a target weight
    Plates {
        target: f64,
        /// Bar type id (see catalog)
        #[arg(long)]
        bar: Option<String>,
        /// Only use plates from the equipment inventory
        #[arg(long)]
        inventory: bool,
    },

    /// Rest stopwatch controls
    Rest {
        #[arg(value_enum, default_value_t = RestAction::Status)]
        action: RestAction,
        /// Keep polling and print rest alerts as they fire
        #[arg(long)]
        watch: bool,
        /// With --watch, poll a single time (for testing)
        #[arg(long, requires = "watch")]
        once: bool,
    },

    /// Set the weight increment for an exercise
    Increment { exercise_id: String, value: f64 },

    /// Set the preferred bar for an exercise
    Bar { exercise_id: String, bar_id: String },

    /// Export completed history as CSV, one row per set
    Export { path: PathBuf },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RestAction {
    Start,
    Pause,
    Resume,
    Dismiss,
    Status,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum VariationArg {
    A,
    B,
}

impl From<VariationArg> for Variation {
    fn from(arg: VariationArg) -> Self {
        match arg {
            VariationArg::A => Variation::A,
            VariationArg::B => Variation::B,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StatusArg {
    Pending,
    Completed,
    Failed,
}

impl From<StatusArg> for SetStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Pending => SetStatus::Pending,
            StatusArg::Completed => SetStatus::Completed,
            StatusArg::Failed => SetStatus::Failed,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    lift_core::logging::init_with_level(lift_core::logging::level_for_verbosity(cli.verbose));

    // Determine data directory
    let config = Config::load()?;
    let data_dir = cli.data_dir.clone().unwrap_or_else(|| config.data.data_dir.clone());

    match run(cli.command.unwrap_or(Commands::Show), data_dir, &config) {
        Err(e) if e.is_user_correctable() => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        other => other,
    }
}

fn run(command: Commands, data_dir: PathBuf, config: &Config) -> Result<()> {
    let program = stronglifts_5x5();
    let definitions = seed_exercise_definitions();
    let errors = program.validate(&definitions);
    if !errors.is_empty() {
        eprintln!("Program validation errors:");
        for error in &errors {
            eprintln!("  - {}", error);
        }
        return Err(Error::Integrity("Invalid program".into()));
    }

    let store = FileStore::new(data_dir);
    ensure_progression_seed(&store, &seed_progression_states())?;
    let repos = Repositories::from_store(&store);
    let ctx = Context {
        repos,
        program,
        definitions: &definitions,
        config,
    };

    match command {
        Commands::Start => cmd_start(&ctx),
        Commands::Show => cmd_show(&ctx),
        Commands::Tap { exercise, set } => cmd_tap(&ctx, exercise, set),
        Commands::Weight { exercise, value } => cmd_weight(&ctx, exercise, &value),
        Commands::Switch { variation } => cmd_switch(&ctx, variation.into()),
        Commands::Complete => cmd_complete(&ctx),
        Commands::Abandon => cmd_abandon(&ctx),
        Commands::History { limit } => cmd_history(&ctx, limit),
        Commands::Edit {
            workout_id,
            exercise,
            set,
            status,
            reps,
        } => cmd_edit(&ctx, &workout_id, exercise, set, status.into(), reps),
        Commands::Delete { workout_id } => cmd_delete(&ctx, &workout_id),
        Commands::Plates {
            target,
            bar,
            inventory,
        } => cmd_plates(&ctx, target, bar, inventory),
        Commands::Rest {
            action,
            watch,
            once,
        } => cmd_rest(&ctx, action, watch, once),
        Commands::Increment { exercise_id, value } => {
            let state = update_progression_increment(repos.progressions, &exercise_id, value)?;
            println!(
                "✓ {} now progresses by {} {}",
                ctx.exercise_name(&exercise_id),
                state.plate_increment,
                state.unit
            );
            Ok(())
        }
        Commands::Bar {
            exercise_id,
            bar_id,
        } => {
            update_preferred_bar(repos.progressions, &exercise_id, &bar_id)?;
            println!(
                "✓ {} will use bar {} from the next workout",
                ctx.exercise_name(&exercise_id),
                bar_id
            );
            Ok(())
        }
        Commands::Export { path } => {
            let rows = export_history_csv(repos.workouts, &path)?;
            println!("✓ Exported {} sets to {}", rows, path.display());
            Ok(())
        }
    }
}

struct Context<'a> {
    repos: Repositories<'a>,
    program: &'a Program,
    definitions: &'a HashMap<String, ExerciseDefinition>,
    config: &'a Config,
}

impl Context<'_> {
    fn exercise_name<'n>(&'n self, exercise_id: &'n str) -> &'n str {
        self.definitions
            .get(exercise_id)
            .map(|d| d.name.as_str())
            .unwrap_or(exercise_id)
    }

    fn unit(&self) -> Unit {
        self.config.display.unit
    }

    fn require_active(&self) -> Result<Workout> {
        get_active_workout(self.repos)?.ok_or_else(|| {
            Error::InvalidOperation("No active workout. Run `lift5x5 start` first.".into())
        })
    }
}

/// Exercise by 1-based display number
fn exercise_at(workout: &Workout, exercise: usize) -> Result<&ExerciseInstance> {
    exercise
        .checked_sub(1)
        .and_then(|i| workout.ordered_instances().get(i).copied())
        .ok_or_else(|| Error::Validation(format!("No exercise #{} in this workout", exercise)))
}

/// Set by 1-based display numbers
fn set_at(workout: &Workout, exercise: usize, set: usize) -> Result<Set> {
    let instance = exercise_at(workout, exercise)?;
    let mut sets: Vec<&Set> = instance.sets.iter().collect();
    sets.sort_by_key(|s| s.order_index);
    set.checked_sub(1)
        .and_then(|i| sets.get(i))
        .map(|s| (*s).clone())
        .ok_or_else(|| {
            Error::Validation(format!("No set #{} for exercise #{}", set, exercise))
        })
}

/// Resolve a full workout id or a unique prefix of one
fn resolve_workout_id(ctx: &Context, input: &str) -> Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(input) {
        return Ok(id);
    }

    let prefix = input.trim().to_lowercase();
    if prefix.is_empty() {
        return Err(Error::Validation("Workout id must not be empty".into()));
    }
    let matches: Vec<Uuid> = ctx
        .repos
        .workouts
        .list_all()?
        .into_iter()
        .map(|w| w.id)
        .filter(|id| id.to_string().starts_with(&prefix))
        .collect();

    match matches.as_slice() {
        [id] => Ok(*id),
        [] => Err(Error::NotFound(format!("Workout {}", input))),
        _ => Err(Error::Validation(format!(
            "Workout id prefix '{}' is ambiguous",
            input
        ))),
    }
}

fn short_id(id: Uuid) -> String {
    id.to_string()[..8].to_string()
}

fn set_marker(set: &Set) -> String {
    if !set.enabled {
        return "-".into();
    }
    match (set.status, set.actual_reps) {
        (SetStatus::Pending, _) => ".".into(),
        (SetStatus::Completed, reps) => reps.unwrap_or(set.target_reps).to_string(),
        (SetStatus::Failed, reps) => format!("{}x", reps.unwrap_or(0)),
    }
}

fn display_workout(ctx: &Context, workout: &Workout) {
    let now = chrono::Utc::now();
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  WORKOUT {}", workout.variation);
    println!("╰─────────────────────────────────────────╯");
    println!("  id {}", workout.id);
    if let Some(elapsed) = workout.elapsed_ms(now) {
        println!("  Elapsed: {} min", elapsed / 60_000);
    }
    println!();

    for (index, exercise) in workout.ordered_instances().into_iter().enumerate() {
        let mut sets: Vec<&Set> = exercise.sets.iter().collect();
        sets.sort_by_key(|s| s.order_index);
        let markers: Vec<String> = sets.iter().map(|s| set_marker(s)).collect();
        println!(
            "  {}. {:<16} {:>6} {}  [{}]",
            index + 1,
            ctx.exercise_name(&exercise.exercise_definition_id),
            exercise.work_weight,
            ctx.unit(),
            markers.join(" ")
        );
    }
    println!();
}

fn display_rest(stopwatch: Option<&StopwatchState>) {
    let now = chrono::Utc::now();
    let Some(stopwatch) = stopwatch else {
        println!("Rest: not started");
        return;
    };

    let elapsed = stopwatch.elapsed_seconds(now);
    let clock = format!("{}:{:02}", elapsed / 60, elapsed % 60);
    match stopwatch.phase() {
        StopwatchPhase::NotStarted => println!("Rest: not started"),
        StopwatchPhase::Running => println!("Rest: {} (running)", clock),
        StopwatchPhase::Paused => println!("Rest: {} (paused)", clock),
        StopwatchPhase::Dismissed => println!("Rest: {} (dismissed)", clock),
    }
}

fn cmd_start(ctx: &Context) -> Result<()> {
    let resuming = get_active_workout(ctx.repos)?;
    let workout = match resuming {
        Some(workout) => {
            println!("Resuming workout {}", workout.variation);
            workout
        }
        None => {
            let workout = start_or_resume_workout(
                ctx.repos,
                ctx.program,
                ctx.definitions,
                chrono::Utc::now(),
            )?;
            println!("✓ Started workout {}", workout.variation);
            workout
        }
    };
    display_workout(ctx, &workout);
    Ok(())
}

fn cmd_show(ctx: &Context) -> Result<()> {
    match get_active_workout(ctx.repos)? {
        Some(workout) => {
            display_workout(ctx, &workout);
            let app_state = get_or_init_app_state(ctx.repos.app_state)?;
            display_rest(app_state.active_stopwatch.as_ref());
        }
        None => println!("No active workout. Run `lift5x5 start` to begin."),
    }
    Ok(())
}

fn cmd_tap(ctx: &Context, exercise: usize, set: usize) -> Result<()> {
    let workout = ctx.require_active()?;
    let target = set_at(&workout, exercise, set)?;
    let instance = exercise_at(&workout, exercise)?;

    let outcome = tap_set(ctx.repos, target.id, chrono::Utc::now())?;
    let name = ctx.exercise_name(&instance.exercise_definition_id);
    match outcome.set.actual_reps {
        Some(reps) => println!(
            "{} set {}: {} ({}/{})",
            name, set, outcome.set.status, reps, outcome.set.target_reps
        ),
        None => println!("{} set {}: {}", name, set, outcome.set.status),
    }
    Ok(())
}

fn cmd_weight(ctx: &Context, exercise: usize, value: &str) -> Result<()> {
    let weight = parse_work_weight(value)?;
    let workout = ctx.require_active()?;
    let instance = exercise_at(&workout, exercise)?;

    update_work_weight(ctx.repos, instance.id, weight)?;
    println!(
        "✓ {} working weight set to {} {}",
        ctx.exercise_name(&instance.exercise_definition_id),
        weight,
        ctx.unit()
    );
    Ok(())
}

fn cmd_switch(ctx: &Context, variation: Variation) -> Result<()> {
    let workout = switch_variation(ctx.repos, ctx.program, ctx.definitions, variation)?;
    println!("✓ Switched to workout {}", workout.variation);
    display_workout(ctx, &workout);
    Ok(())
}

fn cmd_complete(ctx: &Context) -> Result<()> {
    let summary = complete_active_workout(ctx.repos, chrono::Utc::now())?;
    println!("✓ Workout {} completed", summary.workout.variation);

    for change in &summary.progressions {
        let name = ctx.exercise_name(&change.exercise_definition_id);
        let outcome = &change.outcome;
        let note = if outcome.success {
            String::new()
        } else if outcome.deloaded {
            " (deload)".to_string()
        } else {
            format!(" (failed {}x in a row)", outcome.next_failure_streak)
        };
        println!(
            "  {}: {} -> {} {}{}",
            name,
            change.performed_weight,
            outcome.next_weight,
            ctx.unit(),
            note
        );
    }
    Ok(())
}

fn cmd_abandon(ctx: &Context) -> Result<()> {
    match abandon_active_workout(ctx.repos)? {
        Some(id) => println!("✓ Discarded workout {}", short_id(id)),
        None => println!("No active workout."),
    }
    Ok(())
}

fn cmd_history(ctx: &Context, limit: Option<usize>) -> Result<()> {
    let history = list_history(ctx.repos.workouts)?;
    if history.is_empty() {
        println!("No completed workouts yet.");
        return Ok(());
    }

    for workout in history.iter().take(limit.unwrap_or(usize::MAX)) {
        let date = workout
            .completed_at
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        let exercises: Vec<String> = workout
            .ordered_instances()
            .into_iter()
            .map(|e| {
                let mut sets: Vec<&Set> = e.sets.iter().collect();
                sets.sort_by_key(|s| s.order_index);
                let markers: Vec<String> = sets.iter().map(|s| set_marker(s)).collect();
                format!(
                    "{} {} [{}]",
                    ctx.exercise_name(&e.exercise_definition_id),
                    e.work_weight,
                    markers.join(" ")
                )
            })
            .collect();
        println!(
            "{}  {}  {}  {}",
            short_id(workout.id),
            date,
            workout.variation,
            exercises.join(", ")
        );
    }
    Ok(())
}

fn cmd_edit(
    ctx: &Context,
    workout_id: &str,
    exercise: usize,
    set: usize,
    status: SetStatus,
    reps: Option<u32>,
) -> Result<()> {
    let id = resolve_workout_id(ctx, workout_id)?;
    let stored = ctx
        .repos
        .workouts
        .get_by_id(id)?
        .ok_or_else(|| Error::NotFound(format!("Workout {}", workout_id)))?;
    let target = set_at(&stored, exercise, set)?;

    let actual_reps = match status {
        SetStatus::Pending => None,
        SetStatus::Completed => Some(reps.unwrap_or(target.target_reps)),
        SetStatus::Failed => Some(reps.unwrap_or(target.target_reps.saturating_sub(1))),
    };

    let mut draft = stored.clone();
    if let Some(slot) = draft.find_set_mut(target.id) {
        slot.status = status;
        slot.actual_reps = actual_reps;
    }

    update_completed_workout(ctx.repos, &draft)?;
    println!("✓ Updated workout {} exercise {} set {}", short_id(id), exercise, set);
    Ok(())
}

fn cmd_delete(ctx: &Context, workout_id: &str) -> Result<()> {
    let id = resolve_workout_id(ctx, workout_id)?;
    soft_delete_workout(ctx.repos, id)?;
    println!("✓ Deleted workout {}", short_id(id));
    Ok(())
}

fn format_plates(load: &PlateLoad) -> String {
    let plates = load.flattened();
    if plates.is_empty() {
        return "empty bar".to_string();
    }
    plates
        .iter()
        .map(|w| w.to_string())
        .collect::<Vec<_>>()
        .join(" + ")
}

fn cmd_plates(ctx: &Context, target: f64, bar: Option<String>, inventory: bool) -> Result<()> {
    if !target.is_finite() || target <= 0.0 {
        return Err(Error::Validation(format!(
            "Target weight must be a positive number, got {}",
            target
        )));
    }

    let bar_id = bar.unwrap_or_else(|| DEFAULT_BAR_TYPE_ID.to_string());
    let bar = bar_type(&bar_id)
        .ok_or_else(|| Error::Validation(format!("Unknown bar type: {}", bar_id)))?;

    let load = if inventory {
        let app_state = get_or_init_app_state(ctx.repos.app_state)?;
        let plates = app_state
            .equipment_inventory
            .map(|inv| inv.plates)
            .unwrap_or_default();
        compute_inventory_stack(target, bar.weight, &plates, ctx.unit())
    } else {
        compute_stack(target, &ctx.config.plate_calculator_config(bar.weight))
    };

    println!("Bar: {} ({} {})", bar.name, bar.weight, bar.unit);
    println!("Per side: {}", format_plates(&load));
    println!("Total: {} {}", load.total_weight, ctx.unit());
    if load.rounded && load.delta > 0.0 {
        println!("  {} {} short of {}", load.delta, ctx.unit(), target);
    } else if load.rounded {
        println!("  {} {} over {}", -load.delta, ctx.unit(), target);
    }
    Ok(())
}

fn cmd_rest(ctx: &Context, action: RestAction, watch: bool, once: bool) -> Result<()> {
    let repository = ctx.repos.app_state;
    let now = chrono::Utc::now();

    let state = match action {
        RestAction::Start => {
            app_state::start_stopwatch(repository, &ctx.config.stopwatch.alert_thresholds_sec, now)?
        }
        RestAction::Pause => app_state::pause_stopwatch(repository, now)?,
        RestAction::Resume => app_state::resume_stopwatch(repository, now)?,
        RestAction::Dismiss => app_state::dismiss_stopwatch(repository)?,
        RestAction::Status => get_or_init_app_state(repository)?,
    };
    display_rest(state.active_stopwatch.as_ref());

    if watch {
        watch_rest(ctx, once)?;
    }
    Ok(())
}

/// Poll the persisted stopwatch and print alerts until all have fired
fn watch_rest(ctx: &Context, once: bool) -> Result<()> {
    let interval = std::time::Duration::from_millis(ctx.config.stopwatch.poll_interval_ms);

    loop {
        let now = chrono::Utc::now();
        let mut events = Vec::new();
        let state = app_state::update_stopwatch(ctx.repos.app_state, |current| {
            current.map(|mut stopwatch| {
                if stopwatch.is_running() {
                    events = poll_stopwatch(&mut stopwatch, now);
                }
                stopwatch
            })
        })?;

        for event in &events {
            println!("⏰ {}", event.message);
        }

        let keep_watching = state
            .active_stopwatch
            .as_ref()
            .is_some_and(|sw| sw.is_running() && !sw.all_alerts_fired());
        if once || !keep_watching {
            return Ok(());
        }

        std::thread::sleep(interval);
    }
}
