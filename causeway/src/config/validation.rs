//! Scenario validation
//!
//! Semantic checks on a deserialized [`ScenarioConfig`]. Validation
//! collects every issue rather than stopping at the first, so a scenario
//! author sees all problems at once.

use std::collections::HashSet;

use causeway_core::config::{BlockSeed, ListenerRule, ScenarioConfig, Step};
use causeway_core::error::{Severity, ValidationIssue};
use causeway_core::types::BlockPos;

use crate::config::loader::ScenarioLimits;
use crate::phase::state::{self, PhaseKind};

// ============================================================================
// Public API
// ============================================================================

/// Result of scenario validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Scenario validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
    step_count: usize,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a scenario and returns every issue found.
    pub fn validate(
        &mut self,
        config: &ScenarioConfig,
        limits: &ScenarioLimits,
    ) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();
        self.step_count = 0;

        self.validate_metadata(config);
        self.validate_world(config);
        self.validate_listeners(&config.listeners);

        if config.steps.is_empty() {
            self.add_warning("steps", "Scenario has no steps");
        }
        for (i, step) in config.steps.iter().enumerate() {
            self.validate_step(step, &format!("steps[{i}]"), PhaseKind::Idle, 1, limits);
        }

        if let Some(expect) = &config.expect {
            self.validate_block_list(&expect.blocks, "expect.blocks");
        }

        if self.step_count > limits.max_steps {
            self.add_error(
                "steps",
                &format!(
                    "Too many steps: {} (maximum: {}). \
                     Set CAUSEWAY_MAX_STEPS to increase the limit.",
                    self.step_count, limits.max_steps
                ),
            );
        }

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    // ========================================================================
    // Metadata and World
    // ========================================================================

    fn validate_metadata(&mut self, config: &ScenarioConfig) {
        if config.name.trim().is_empty() {
            self.add_error("name", "Scenario name is required and cannot be empty");
        }

        if config.name.len() > 100 {
            self.add_warning("name", "Scenario name is unusually long (> 100 characters)");
        }
    }

    fn validate_world(&mut self, config: &ScenarioConfig) {
        self.validate_block_list(&config.world.blocks, "world.blocks");

        for (i, block) in config.world.blocks.iter().enumerate() {
            if is_air_id(&block.state) {
                self.add_warning(
                    &format!("world.blocks[{i}].state"),
                    "Seeding air has no effect; unlisted positions are already air",
                );
            }
        }

        for (i, entity) in config.world.entities.iter().enumerate() {
            if entity.kind.trim().is_empty() {
                self.add_error(
                    &format!("world.entities[{i}].kind"),
                    "Entity kind cannot be empty",
                );
            }
        }
    }

    /// Checks a list of block seeds for empty states and repeated positions.
    fn validate_block_list(&mut self, blocks: &[BlockSeed], base_path: &str) {
        let mut seen: HashSet<BlockPos> = HashSet::new();
        for (i, block) in blocks.iter().enumerate() {
            let path = format!("{base_path}[{i}]");
            if block.state.trim().is_empty() {
                self.add_error(&format!("{path}.state"), "Block state cannot be empty");
            }
            if !seen.insert(block.pos) {
                self.add_error(
                    &format!("{path}.pos"),
                    &format!("Duplicate block position {}", block.pos),
                );
            }
        }
    }

    fn validate_listeners(&mut self, listeners: &[ListenerRule]) {
        for (i, rule) in listeners.iter().enumerate() {
            let path = format!("listeners[{i}]");
            if listeners[..i].contains(rule) {
                self.add_warning(&path, "Duplicate listener rule; it runs twice");
            }
            if let ListenerRule::CancelSpawns { kind: Some(kind) } = rule {
                if kind.trim().is_empty() {
                    self.add_error(&format!("{path}.kind"), "Entity kind cannot be empty");
                }
            }
        }
    }

    // ========================================================================
    // Steps
    // ========================================================================

    fn validate_step(
        &mut self,
        step: &Step,
        path: &str,
        parent: PhaseKind,
        depth: usize,
        limits: &ScenarioLimits,
    ) {
        self.step_count += 1;

        match step {
            Step::Command {
                source, command, ..
            } => {
                if source.trim().is_empty() {
                    self.add_error(&format!("{path}.source"), "Command source cannot be empty");
                }
                if command.trim().is_empty() {
                    self.add_warning(&format!("{path}.command"), "Command line is empty");
                }
            }
            Step::Explosion { radius, .. } => {
                if !radius.is_finite() || *radius <= 0.0 {
                    self.add_error(
                        &format!("{path}.radius"),
                        &format!("Explosion radius must be a positive number, got {radius}"),
                    );
                } else if *radius > 16.0 {
                    self.add_warning(
                        &format!("{path}.radius"),
                        "Explosion radius is unusually large (> 16)",
                    );
                }
            }
            Step::PluginTask {
                plugin, acting_for, ..
            } => {
                if plugin.trim().is_empty() {
                    self.add_error(&format!("{path}.plugin"), "Plugin id cannot be empty");
                }
                if acting_for.as_deref().is_some_and(|p| p.trim().is_empty()) {
                    self.add_error(&format!("{path}.acting_for"), "Player name cannot be empty");
                }
            }
            Step::BlockTick { .. } | Step::TileEntityUnload { .. } => {}
            Step::SetBlock { state, .. } => {
                if state.trim().is_empty() {
                    self.add_error(&format!("{path}.state"), "Block state cannot be empty");
                }
            }
            Step::SpawnEntity { kind, count, .. } => {
                if kind.trim().is_empty() {
                    self.add_error(&format!("{path}.kind"), "Entity kind cannot be empty");
                }
                if *count == 0 {
                    self.add_warning(&format!("{path}.count"), "Spawning zero entities does nothing");
                }
            }
            Step::DropItem { item, quantity, .. } => {
                self.validate_item(item, *quantity, path);
            }
            Step::KillEntity { kind, drops } => {
                if kind.trim().is_empty() {
                    self.add_error(&format!("{path}.kind"), "Entity kind cannot be empty");
                }
                for (i, drop) in drops.iter().enumerate() {
                    self.validate_item(&drop.item, drop.quantity, &format!("{path}.drops[{i}]"));
                }
            }
        }

        let Some(kind) = activity_kind(step) else {
            return;
        };

        if depth > limits.max_step_depth {
            self.add_error(
                path,
                &format!(
                    "Activity nesting too deep: {depth} (maximum: {}). \
                     Set CAUSEWAY_MAX_STEP_DEPTH to increase the limit.",
                    limits.max_step_depth
                ),
            );
            return;
        }

        if !state::for_kind(parent).can_switch_to(kind) {
            self.add_warning(
                path,
                &format!("{kind} cannot start inside {parent}; this step will be refused"),
            );
        }

        for (i, child) in step.children().iter().enumerate() {
            self.validate_step(child, &format!("{path}.steps[{i}]"), kind, depth + 1, limits);
        }
    }

    fn validate_item(&mut self, item: &str, quantity: u32, path: &str) {
        if item.trim().is_empty() {
            self.add_error(&format!("{path}.item"), "Item id cannot be empty");
        }
        if quantity == 0 {
            self.add_error(&format!("{path}.quantity"), "Item quantity must be at least 1");
        }
    }

    // ========================================================================
    // Helper Methods
    // ========================================================================

    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Phase kind an activity step pushes; `None` for plain mutations.
#[must_use]
pub const fn activity_kind(step: &Step) -> Option<PhaseKind> {
    match step {
        Step::Command { .. } => Some(PhaseKind::Command),
        Step::Explosion { .. } => Some(PhaseKind::Explosion),
        Step::BlockTick { .. } => Some(PhaseKind::BlockTick),
        Step::PluginTask { .. } => Some(PhaseKind::PluginTask),
        Step::TileEntityUnload { .. } => Some(PhaseKind::TileEntityUnload),
        Step::SetBlock { .. }
        | Step::SpawnEntity { .. }
        | Step::DropItem { .. }
        | Step::KillEntity { .. } => None,
    }
}

fn is_air_id(state: &str) -> bool {
    matches!(state, "air" | "minecraft:air")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use causeway_core::config::{EntitySeed, Expectations, ItemSpec};

    fn limits() -> ScenarioLimits {
        ScenarioLimits {
            max_scenario_size: 1024,
            max_steps: 10,
            max_step_depth: 3,
        }
    }

    fn minimal_config() -> ScenarioConfig {
        serde_yaml::from_str("name: test\nsteps:\n  - { type: set_block, pos: { x: 0, y: 0, z: 0 }, state: stone }\n")
            .unwrap()
    }

    fn set_block() -> Step {
        Step::SetBlock {
            pos: BlockPos::new(0, 64, 0),
            state: "minecraft:stone".into(),
        }
    }

    fn command(steps: Vec<Step>) -> Step {
        Step::Command {
            source: "alice".into(),
            command: "/say hi".into(),
            steps,
        }
    }

    fn validate(config: &ScenarioConfig) -> ValidationResult {
        Validator::new().validate(config, &limits())
    }

    #[test]
    fn test_validate_minimal_config() {
        let result = validate(&minimal_config());
        assert!(result.is_valid(), "{:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_validate_empty_name() {
        let mut config = minimal_config();
        config.name = "  ".into();
        let result = validate(&config);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "name");
    }

    #[test]
    fn test_validate_no_steps_warning() {
        let mut config = minimal_config();
        config.steps.clear();
        let result = validate(&config);
        assert!(result.is_valid());
        assert_eq!(result.warnings[0].path, "steps");
    }

    #[test]
    fn test_validate_duplicate_world_blocks() {
        let mut config = minimal_config();
        let seed = BlockSeed {
            pos: BlockPos::new(1, 2, 3),
            state: "minecraft:stone".into(),
        };
        config.world.blocks = vec![seed.clone(), seed];
        let result = validate(&config);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "world.blocks[1].pos");
        assert!(result.errors[0].message.contains("(1, 2, 3)"));
    }

    #[test]
    fn test_validate_air_seed_warning() {
        let mut config = minimal_config();
        config.world.blocks.push(BlockSeed {
            pos: BlockPos::new(0, 0, 0),
            state: "minecraft:air".into(),
        });
        let result = validate(&config);
        assert!(result.is_valid());
        assert_eq!(result.warnings[0].path, "world.blocks[0].state");
    }

    #[test]
    fn test_validate_empty_entity_kind() {
        let mut config = minimal_config();
        config.world.entities.push(EntitySeed {
            kind: String::new(),
            pos: BlockPos::default(),
        });
        let result = validate(&config);
        assert_eq!(result.errors[0].path, "world.entities[0].kind");
    }

    #[test]
    fn test_validate_bad_explosion_radius() {
        let mut config = minimal_config();
        config.steps = vec![Step::Explosion {
            at: BlockPos::default(),
            world: None,
            dimension: causeway_core::types::Dimension::Overworld,
            radius: f32::NAN,
            detonator: None,
            steps: Vec::new(),
        }];
        let result = validate(&config);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "steps[0].radius");
    }

    #[test]
    fn test_validate_nested_paths() {
        let mut config = minimal_config();
        config.steps = vec![command(vec![
            set_block(),
            Step::DropItem {
                pos: BlockPos::default(),
                item: "minecraft:dirt".into(),
                quantity: 0,
            },
        ])];
        let result = validate(&config);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "steps[0].steps[1].quantity");
    }

    #[test]
    fn test_validate_kill_entity_drops() {
        let mut config = minimal_config();
        config.steps = vec![Step::KillEntity {
            kind: "minecraft:cow".into(),
            drops: vec![ItemSpec {
                item: String::new(),
                quantity: 1,
            }],
        }];
        let result = validate(&config);
        assert_eq!(result.errors[0].path, "steps[0].drops[0].item");
    }

    #[test]
    fn test_validate_illegal_nesting_warning() {
        let mut config = minimal_config();
        config.steps = vec![Step::TileEntityUnload {
            pos: BlockPos::default(),
            steps: vec![command(vec![set_block()])],
        }];
        let result = validate(&config);
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].path, "steps[0].steps[0]");
        assert!(result.warnings[0].message.contains("will be refused"));
    }

    #[test]
    fn test_validate_legal_nesting_is_silent() {
        let mut config = minimal_config();
        config.steps = vec![command(vec![Step::BlockTick {
            pos: BlockPos::default(),
            steps: vec![set_block()],
        }])];
        let result = validate(&config);
        assert!(result.is_valid());
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    }

    #[test]
    fn test_validate_too_deep() {
        let mut config = minimal_config();
        let mut step = command(Vec::new());
        for _ in 0..3 {
            step = command(vec![step]);
        }
        config.steps = vec![step];
        let result = validate(&config);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "steps[0].steps[0].steps[0].steps[0]");
    }

    #[test]
    fn test_validate_too_many_steps() {
        let mut config = minimal_config();
        config.steps = vec![set_block(); 11];
        let result = validate(&config);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("CAUSEWAY_MAX_STEPS"));
    }

    #[test]
    fn test_validate_duplicate_listener_warning() {
        let mut config = minimal_config();
        config.listeners = vec![ListenerRule::CancelPost, ListenerRule::CancelPost];
        let result = validate(&config);
        assert!(result.is_valid());
        assert_eq!(result.warnings[0].path, "listeners[1]");
    }

    #[test]
    fn test_validate_duplicate_expected_blocks() {
        let mut config = minimal_config();
        let seed = BlockSeed {
            pos: BlockPos::new(0, 64, 0),
            state: "minecraft:air".into(),
        };
        config.expect = Some(Expectations {
            blocks: vec![seed.clone(), seed],
            ..Expectations::default()
        });
        let result = validate(&config);
        assert_eq!(result.errors[0].path, "expect.blocks[1].pos");
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut config = minimal_config();
        config.name = String::new();
        config.steps = vec![
            Step::SetBlock {
                pos: BlockPos::default(),
                state: String::new(),
            },
            Step::SpawnEntity {
                kind: String::new(),
                pos: BlockPos::default(),
                count: 1,
            },
        ];
        let result = validate(&config);
        assert_eq!(result.errors.len(), 3);
    }

    #[test]
    fn test_activity_kind() {
        assert_eq!(activity_kind(&command(Vec::new())), Some(PhaseKind::Command));
        assert_eq!(activity_kind(&set_block()), None);
    }
}
