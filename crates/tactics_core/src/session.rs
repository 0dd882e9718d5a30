//! The per-encounter combat state machine.
//!
//! A [`CombatSession`] owns every combatant, the occupancy grid and the turn
//! order for one encounter. It advances through automatic phases on its own
//! and suspends only where it needs outside input:
//!
//! - a player actor choosing an action ([`Phase::PlayerSelectingAction`]),
//! - a player confirming an attack ([`Phase::PlayerConfirmingAttack`]),
//! - any actor walking a path, until the presentation layer reports
//!   [`Intent::MovementArrived`] for each step.
//!
//! Bad input never errors. It comes back as [`IntentOutcome::Rejected`] and
//! leaves the session exactly as it was.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::ai::choose_approach;
use crate::config::CombatConfig;
use crate::error::{CombatError, Result};
use crate::events::{CombatEvent, CombatOutcome};
use crate::grid::{Cell, GridIndex, TerrainMap};
use crate::reachability::Reachable;
use crate::turn::{EndReason, TurnAdvance, TurnEntry, TurnOrder, TurnSignal};
use crate::unit::{CombatUnit, MovementStatus, Team, UnitId};

// ============================================================================
// State
// ============================================================================

/// Where an active session is within the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// A new actor is about to act.
    TurnStart,
    /// Waiting for a player move, attack or pass. Also covers the player's
    /// own movement until the last step arrives.
    PlayerSelectingAction,
    /// A player attack is waiting for confirm or cancel.
    PlayerConfirmingAttack {
        /// The selected target.
        target: UnitId,
    },
    /// The enemy AI is choosing where to go.
    EnemyDeciding,
    /// An enemy is walking its path.
    EnemyMoving,
    /// Cleanup and hand-over to the next actor.
    TurnEnd,
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// Units are placed but no turn has begun.
    NotStarted,
    /// Combat is running.
    Active(Phase),
    /// Terminal.
    Ended(CombatOutcome),
}

impl SessionState {
    /// True while combat is running.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active(_))
    }

    /// True once the session is over.
    #[must_use]
    pub const fn is_ended(self) -> bool {
        matches!(self, Self::Ended(_))
    }

    /// Current phase, if active.
    #[must_use]
    pub const fn phase(self) -> Option<Phase> {
        match self {
            Self::Active(phase) => Some(phase),
            _ => None,
        }
    }
}

// ============================================================================
// Inputs and outputs
// ============================================================================

/// Everything needed to build a session.
///
/// Which list a unit is in decides its team; the `team` field of the units
/// themselves is overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterSetup {
    /// Level geometry.
    pub terrain: TerrainMap,
    /// Player units, in encounter order.
    pub players: Vec<CombatUnit>,
    /// Enemy units, in encounter order.
    pub enemies: Vec<CombatUnit>,
    /// Rules.
    #[serde(default)]
    pub config: CombatConfig,
}

impl EncounterSetup {
    /// Start an empty setup on `terrain` with default rules.
    #[must_use]
    pub fn new(terrain: TerrainMap) -> Self {
        Self {
            terrain,
            players: Vec::new(),
            enemies: Vec::new(),
            config: CombatConfig::default(),
        }
    }

    /// Builder method to add a player unit.
    #[must_use]
    pub fn with_player(mut self, mut unit: CombatUnit) -> Self {
        unit.team = Team::Player;
        self.players.push(unit);
        self
    }

    /// Builder method to add an enemy unit.
    #[must_use]
    pub fn with_enemy(mut self, mut unit: CombatUnit) -> Self {
        unit.team = Team::Enemy;
        self.enemies.push(unit);
        self
    }

    /// Builder method to replace the rules.
    #[must_use]
    pub fn with_config(mut self, config: CombatConfig) -> Self {
        self.config = config;
        self
    }
}

/// Input from the presentation or input layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Intent {
    /// Move the active player unit to a reachable cell.
    SelectCell(Cell),
    /// Attack an enemy within range.
    SelectTarget(UnitId),
    /// Confirm a pending attack.
    ConfirmAttack,
    /// Drop a pending attack and go back to action selection.
    CancelAttack,
    /// End the active player's turn without acting.
    PassTurn,
    /// The unit finished animating into its latest cell.
    MovementArrived(UnitId),
}

/// Why an intent had no effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rejection {
    /// Not accepted in the current phase.
    IllegalPhase,
    /// Cell not reachable, target out of range, dead or friendly.
    InvalidSelection,
    /// Arrival reported for a unit that is not walking.
    NotMoving,
}

/// Result of [`CombatSession::handle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntentOutcome {
    /// The intent changed the session.
    Accepted,
    /// The intent was ignored.
    Rejected(Rejection),
}

impl IntentOutcome {
    /// True for [`IntentOutcome::Accepted`].
    #[must_use]
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Result of a successful [`CombatSession::apply_damage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageOutcome {
    /// The damaged unit.
    pub target: UnitId,
    /// Hp after the hit.
    pub new_hp: i32,
    /// The hit was lethal and the unit has been removed.
    pub killed: bool,
}

enum Step {
    Entered,
    Finished,
}

type Handled<T = ()> = std::result::Result<T, Rejection>;

// ============================================================================
// Session
// ============================================================================

/// One encounter from first turn to last.
#[derive(Debug, Clone)]
pub struct CombatSession {
    state: SessionState,
    config: CombatConfig,
    grid: GridIndex,
    units: BTreeMap<UnitId, CombatUnit>,
    /// Players then enemies, as listed in the setup.
    encounter_order: Vec<UnitId>,
    turn_order: TurnOrder,
    actor: Option<UnitId>,
    reachable: Reachable,
    events: Vec<CombatEvent>,
    turns_taken: u32,
}

impl CombatSession {
    /// Validate `setup` and place every unit, without starting any turn.
    ///
    /// # Errors
    ///
    /// [`CombatError::InvalidSetup`] for duplicate ids or units with no hp,
    /// and the placement errors of [`GridIndex::place`] for units on
    /// obstacles or sharing a cell.
    pub fn new(setup: EncounterSetup) -> Result<Self> {
        let EncounterSetup {
            terrain,
            players,
            enemies,
            config,
        } = setup;

        let mut grid = GridIndex::new(terrain);
        let mut units = BTreeMap::new();
        let mut encounter_order = Vec::with_capacity(players.len() + enemies.len());
        let mut player_entries = Vec::with_capacity(players.len());
        let mut enemy_entries = Vec::with_capacity(enemies.len());

        for (team, roster) in [(Team::Player, players), (Team::Enemy, enemies)] {
            for mut unit in roster {
                if units.contains_key(&unit.id) {
                    return Err(CombatError::InvalidSetup(format!(
                        "duplicate unit id {}",
                        unit.id
                    )));
                }
                if !unit.is_alive() {
                    return Err(CombatError::InvalidSetup(format!(
                        "unit {} starts with {} hp",
                        unit.id, unit.hp
                    )));
                }
                unit.team = team;
                unit.movement = MovementStatus::Idle;
                grid.place(unit.id, unit.position)?;

                let entry = TurnEntry::new(unit.id, team, unit.stats.speed);
                match team {
                    Team::Player => player_entries.push(entry),
                    Team::Enemy => enemy_entries.push(entry),
                }
                encounter_order.push(unit.id);
                units.insert(unit.id, unit);
            }
        }

        let turn_order = TurnOrder::build(&player_entries, &enemy_entries);
        let actor = turn_order.current();

        Ok(Self {
            state: SessionState::NotStarted,
            config,
            grid,
            units,
            encounter_order,
            turn_order,
            actor,
            reachable: Reachable::default(),
            events: Vec::new(),
            turns_taken: 0,
        })
    }

    /// Build a session and run it up to the first point that needs input.
    ///
    /// # Errors
    ///
    /// See [`CombatSession::new`].
    pub fn start(setup: EncounterSetup) -> Result<Self> {
        let mut session = Self::new(setup)?;
        session.begin();
        Ok(session)
    }

    /// Begin the first turn. Does nothing unless the session is
    /// [`SessionState::NotStarted`].
    pub fn begin(&mut self) {
        if self.state != SessionState::NotStarted {
            debug!(state = ?self.state, "Session already begun");
            return;
        }

        let order: Vec<UnitId> = self.turn_order.ids().collect();
        info!(
            units = order.len(),
            players = self.turn_order.live_count(Team::Player),
            enemies = self.turn_order.live_count(Team::Enemy),
            "Combat started"
        );
        self.events.push(CombatEvent::CombatStarted { order });

        if let TurnSignal::SessionShouldEnd(reason) = self.turn_order.end_signal() {
            self.finish(CombatOutcome::Resolved(reason));
            return;
        }
        self.state = SessionState::Active(Phase::TurnStart);
        self.pump();
    }

    /// Feed one intent into the session.
    pub fn handle(&mut self, intent: Intent) -> IntentOutcome {
        let handled = match intent {
            Intent::SelectCell(cell) => self.select_cell(cell),
            Intent::SelectTarget(target) => self.select_target(target),
            Intent::ConfirmAttack => self.confirm_attack(),
            Intent::CancelAttack => self.cancel_attack(),
            Intent::PassTurn => self.pass_turn(),
            Intent::MovementArrived(unit) => self.movement_arrived(unit),
        };

        match handled {
            Ok(()) => {
                self.pump();
                IntentOutcome::Accepted
            }
            Err(reason) => {
                debug!(?intent, ?reason, state = ?self.state, "Intent rejected");
                IntentOutcome::Rejected(reason)
            }
        }
    }

    /// Deal `attacker`'s attack power to `defender`.
    ///
    /// Kills are removed from the grid and the turn order right away, and
    /// the session ends as soon as the defender's team is empty. Returns
    /// `None` if the session is not active or either unit is unknown, or
    /// the defender is already dead.
    pub fn apply_damage(&mut self, attacker: UnitId, defender: UnitId) -> Option<DamageOutcome> {
        let outcome = self.deal_damage(attacker, defender);
        self.pump();
        outcome
    }

    /// Stop combat immediately. Does nothing once ended.
    pub fn abort(&mut self) {
        if !self.state.is_ended() {
            info!("Combat aborted");
            self.finish(CombatOutcome::Aborted);
        }
    }

    /// Take every buffered event, oldest first.
    pub fn drain_events(&mut self) -> Vec<CombatEvent> {
        std::mem::take(&mut self.events)
    }

    /// Buffered events not yet drained.
    #[must_use]
    pub fn pending_events(&self) -> &[CombatEvent] {
        &self.events
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Current phase, if active.
    #[must_use]
    pub const fn phase(&self) -> Option<Phase> {
        self.state.phase()
    }

    /// How the session ended, if it has.
    #[must_use]
    pub const fn outcome(&self) -> Option<CombatOutcome> {
        match self.state {
            SessionState::Ended(outcome) => Some(outcome),
            _ => None,
        }
    }

    /// True while combat is running.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// True once the session is over.
    #[must_use]
    pub const fn is_ended(&self) -> bool {
        self.state.is_ended()
    }

    /// Rules in effect.
    #[must_use]
    pub const fn config(&self) -> &CombatConfig {
        &self.config
    }

    /// Occupancy and terrain.
    #[must_use]
    pub const fn grid(&self) -> &GridIndex {
        &self.grid
    }

    /// Remaining schedule.
    #[must_use]
    pub const fn turn_order(&self) -> &TurnOrder {
        &self.turn_order
    }

    /// Unit whose turn it is.
    #[must_use]
    pub fn current_actor(&self) -> Option<UnitId> {
        if self.state.is_active() {
            self.actor
        } else {
            None
        }
    }

    /// The acting unit while it is walking a path.
    #[must_use]
    pub fn awaiting_movement(&self) -> Option<UnitId> {
        let actor = self.current_actor()?;
        self.units
            .get(&actor)
            .filter(|u| u.is_moving())
            .map(|u| u.id)
    }

    /// A unit still in the session. Dead units are gone.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<&CombatUnit> {
        self.units.get(&id)
    }

    /// All units still in the session, ordered by id.
    pub fn units(&self) -> impl Iterator<Item = &CombatUnit> + '_ {
        self.units.values()
    }

    /// Living units of `team`, in encounter order.
    pub fn living(&self, team: Team) -> impl Iterator<Item = &CombatUnit> + '_ {
        self.encounter_order
            .iter()
            .filter_map(|id| self.units.get(id))
            .filter(move |u| u.team == team && u.is_alive())
    }

    /// Destinations currently offered to the active player unit.
    #[must_use]
    pub const fn reachable(&self) -> &Reachable {
        &self.reachable
    }

    /// Turns begun so far.
    #[must_use]
    pub const fn turns_taken(&self) -> u32 {
        self.turns_taken
    }

    /// Hash of everything that affects future behaviour.
    ///
    /// Two sessions built from the same setup and fed the same intents
    /// produce the same hash.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.state.hash(&mut hasher);
        self.turns_taken.hash(&mut hasher);
        self.actor.hash(&mut hasher);
        self.turn_order.hash(&mut hasher);

        self.units.len().hash(&mut hasher);
        for unit in self.units.values() {
            unit.hash(&mut hasher);
        }
        hasher.finish()
    }

    // ------------------------------------------------------------------------
    // Intent handlers
    // ------------------------------------------------------------------------

    /// The active player unit, if it is free to choose an action.
    fn selecting_actor(&self) -> Handled<UnitId> {
        if self.state != SessionState::Active(Phase::PlayerSelectingAction) {
            return Err(Rejection::IllegalPhase);
        }
        let actor = self.actor.ok_or(Rejection::IllegalPhase)?;
        match self.units.get(&actor) {
            Some(unit) if !unit.is_moving() => Ok(actor),
            _ => Err(Rejection::IllegalPhase),
        }
    }

    fn select_cell(&mut self, cell: Cell) -> Handled {
        let actor = self.selecting_actor()?;
        if self.grid.position_of(actor) == Some(cell) || !self.reachable.contains(cell) {
            return Err(Rejection::InvalidSelection);
        }

        let path = self
            .grid
            .path_for(actor, cell, self.config.max_search_nodes);
        if path.is_empty() {
            return Err(Rejection::InvalidSelection);
        }

        debug!(unit = actor, destination = %cell, steps = path.len(), "Player move issued");
        self.clear_highlights();
        self.issue_move(actor, path);
        Ok(())
    }

    fn select_target(&mut self, target: UnitId) -> Handled {
        let actor = self.selecting_actor()?;
        let distance = self.validate_target(actor, target)?;

        if self
            .config
            .attack_confirmation
            .requires_confirmation(distance)
        {
            self.state = SessionState::Active(Phase::PlayerConfirmingAttack { target });
            self.events.push(CombatEvent::AttackAwaitingConfirmation {
                attacker: actor,
                target,
            });
            return Ok(());
        }

        self.resolve_player_attack(actor, target);
        Ok(())
    }

    fn confirm_attack(&mut self) -> Handled {
        let SessionState::Active(Phase::PlayerConfirmingAttack { target }) = self.state else {
            return Err(Rejection::IllegalPhase);
        };
        let actor = self.actor.ok_or(Rejection::IllegalPhase)?;

        if self.validate_target(actor, target).is_ok() {
            self.resolve_player_attack(actor, target);
        } else {
            debug!(unit = actor, target, "Pending target no longer valid");
            self.state = SessionState::Active(Phase::PlayerSelectingAction);
        }
        Ok(())
    }

    fn cancel_attack(&mut self) -> Handled {
        if !matches!(
            self.state,
            SessionState::Active(Phase::PlayerConfirmingAttack { .. })
        ) {
            return Err(Rejection::IllegalPhase);
        }
        self.state = SessionState::Active(Phase::PlayerSelectingAction);
        Ok(())
    }

    fn pass_turn(&mut self) -> Handled {
        match self.state {
            SessionState::Active(Phase::PlayerConfirmingAttack { .. }) => {}
            _ => {
                self.selecting_actor()?;
            }
        }
        debug!(unit = ?self.actor, "Turn passed");
        self.clear_highlights();
        self.state = SessionState::Active(Phase::TurnEnd);
        Ok(())
    }

    fn movement_arrived(&mut self, unit: UnitId) -> Handled {
        match self.state {
            SessionState::Active(Phase::PlayerSelectingAction | Phase::EnemyMoving) => {}
            _ => return Err(Rejection::IllegalPhase),
        }
        if self.awaiting_movement() != Some(unit) {
            return Err(Rejection::NotMoving);
        }
        if let Step::Finished = self.step(unit) {
            self.finish_movement(unit);
        }
        Ok(())
    }

    /// Distance to a living opponent within the actor's range.
    fn validate_target(&self, actor: UnitId, target: UnitId) -> Handled<u32> {
        let attacker = self.units.get(&actor).ok_or(Rejection::InvalidSelection)?;
        let defender = self
            .units
            .get(&target)
            .filter(|d| d.is_alive())
            .ok_or(Rejection::InvalidSelection)?;

        if defender.team != attacker.team.opponent() || !attacker.can_reach(defender.position) {
            return Err(Rejection::InvalidSelection);
        }
        Ok(attacker.distance_to(defender.position))
    }

    fn resolve_player_attack(&mut self, actor: UnitId, target: UnitId) {
        self.clear_highlights();
        self.deal_damage(actor, target);
        if self.state.is_active() {
            self.state = SessionState::Active(Phase::TurnEnd);
        }
    }

    // ------------------------------------------------------------------------
    // Automatic phases
    // ------------------------------------------------------------------------

    /// Run automatic phases until the session needs input or ends.
    fn pump(&mut self) {
        loop {
            match self.state {
                SessionState::Active(Phase::TurnStart) => self.start_turn(),
                SessionState::Active(Phase::EnemyDeciding) => self.enemy_decide(),
                SessionState::Active(Phase::TurnEnd) => self.end_turn(),
                _ => break,
            }
        }
        #[cfg(feature = "debug-validation")]
        self.validate_invariants();
    }

    /// Cross-check the unit map against the grid and the turn order.
    #[cfg(feature = "debug-validation")]
    fn validate_invariants(&self) {
        if self.state.is_ended() {
            return;
        }
        for unit in self.units.values() {
            debug_assert!(unit.is_alive(), "dead unit {} left in session", unit.id);
            debug_assert_eq!(
                self.grid.position_of(unit.id),
                Some(unit.position),
                "grid out of sync for unit {}",
                unit.id
            );
            debug_assert!(
                self.turn_order.contains(unit.id),
                "unit {} missing from turn order",
                unit.id
            );
        }
        debug_assert_eq!(self.grid.occupied_count(), self.units.len());
    }

    fn start_turn(&mut self) {
        let Some(actor) = self.actor else {
            self.finish(CombatOutcome::Resolved(EndReason::EmptyTurnOrder));
            return;
        };
        let Some(unit) = self.units.get(&actor) else {
            warn!(unit = actor, "Scheduled unit missing, dropping it from the order");
            self.turn_order.remove(actor);
            self.state = SessionState::Active(Phase::TurnEnd);
            return;
        };
        let team = unit.team;
        let budget = unit.stats.movement_range;

        self.turns_taken += 1;
        let round = self.turn_order.round();
        debug!(unit = actor, ?team, round, turn = self.turns_taken, "Turn started");
        self.events.push(CombatEvent::TurnChanged { unit: actor, round });

        match team {
            Team::Player => {
                self.reachable = self.grid.reachable_for(actor, budget);
                self.events
                    .push(CombatEvent::ReachableCellsChanged(self.reachable.cells()));
                self.state = SessionState::Active(Phase::PlayerSelectingAction);
            }
            Team::Enemy => {
                self.state = SessionState::Active(Phase::EnemyDeciding);
            }
        }
    }

    fn enemy_decide(&mut self) {
        let Some(actor) = self.actor else {
            self.state = SessionState::Active(Phase::TurnEnd);
            return;
        };
        let (Some(cell), Some(range)) = (
            self.grid.position_of(actor),
            self.units.get(&actor).map(|u| u.stats.movement_range),
        ) else {
            self.state = SessionState::Active(Phase::TurnEnd);
            return;
        };

        let players = self.living(Team::Player).map(|u| (u.id, u.position));
        let plan = choose_approach(cell, players, |c| self.grid.is_blocked_for(c, Some(actor)));
        let Some(plan) = plan else {
            debug!(unit = actor, "Enemy holds position");
            self.state = SessionState::Active(Phase::TurnEnd);
            return;
        };

        let mut path = self
            .grid
            .path_for(actor, plan.destination, self.config.max_search_nodes);
        if self.config.enemy_respects_movement_range {
            path.truncate(usize::try_from(range).unwrap_or(usize::MAX));
        }
        if path.is_empty() {
            debug!(unit = actor, destination = %plan.destination, "No path for enemy");
            self.state = SessionState::Active(Phase::TurnEnd);
            return;
        }

        self.state = SessionState::Active(Phase::EnemyMoving);
        self.issue_move(actor, path);
    }

    fn end_turn(&mut self) {
        let dead: Vec<UnitId> = self
            .units
            .values()
            .filter(|u| !u.is_alive())
            .map(|u| u.id)
            .collect();
        for id in dead {
            warn!(unit = id, "Removing dead unit missed at time of death");
            self.remove_dead(id);
            if !self.state.is_active() {
                return;
            }
        }

        match self.turn_order.advance() {
            TurnAdvance::Next(next) => {
                self.actor = Some(next);
                self.state = SessionState::Active(Phase::TurnStart);
            }
            TurnAdvance::SessionShouldEnd(reason) => {
                self.finish(CombatOutcome::Resolved(reason));
            }
        }
    }

    // ------------------------------------------------------------------------
    // Movement, damage, teardown
    // ------------------------------------------------------------------------

    fn issue_move(&mut self, unit: UnitId, path: Vec<Cell>) {
        if let Some(mover) = self.units.get_mut(&unit) {
            mover.movement = MovementStatus::Moving {
                remaining: path.into(),
            };
        }
        if let Step::Finished = self.step(unit) {
            self.finish_movement(unit);
        }
    }

    /// Enter the next path cell, or finish the walk if there is none.
    fn step(&mut self, id: UnitId) -> Step {
        let Some(unit) = self.units.get_mut(&id) else {
            return Step::Finished;
        };
        let next = match &mut unit.movement {
            MovementStatus::Moving { remaining } => remaining.pop_front(),
            MovementStatus::Idle => None,
        };
        let Some(next) = next else {
            unit.movement = MovementStatus::Idle;
            return Step::Finished;
        };

        let from = unit.position;
        if let Err(err) = self.grid.move_occupant(id, from, next) {
            warn!(unit = id, %from, to = %next, error = %err, "Step blocked, stopping");
            unit.movement = MovementStatus::Idle;
            return Step::Finished;
        }
        unit.position = next;
        trace!(unit = id, %from, to = %next, "Unit stepped");
        self.events.push(CombatEvent::UnitMoved {
            unit: id,
            from,
            to: next,
        });
        Step::Entered
    }

    fn finish_movement(&mut self, unit: UnitId) {
        if self.actor == Some(unit) && self.state.is_active() {
            self.state = SessionState::Active(Phase::TurnEnd);
        }
    }

    fn deal_damage(&mut self, attacker: UnitId, defender: UnitId) -> Option<DamageOutcome> {
        if !self.state.is_active() {
            return None;
        }
        let power = self.units.get(&attacker)?.stats.attack_power;
        let unit = self.units.get_mut(&defender).filter(|u| u.is_alive())?;
        let new_hp = unit.take_damage(power);

        debug!(attacker, defender, power, new_hp, "Damage applied");
        self.events.push(CombatEvent::UnitDamaged {
            unit: defender,
            attacker,
            new_hp,
        });

        let killed = new_hp <= 0;
        if killed {
            self.remove_dead(defender);
        }
        Some(DamageOutcome {
            target: defender,
            new_hp,
            killed,
        })
    }

    fn remove_dead(&mut self, id: UnitId) {
        self.units.remove(&id);
        self.grid.remove(id);
        info!(unit = id, "Unit died");
        self.events.push(CombatEvent::UnitDied(id));

        if let TurnSignal::SessionShouldEnd(reason) = self.turn_order.remove(id) {
            self.finish(CombatOutcome::Resolved(reason));
            return;
        }
        if self.actor == Some(id) && self.state.is_active() {
            self.clear_highlights();
            self.state = SessionState::Active(Phase::TurnEnd);
        }
    }

    fn clear_highlights(&mut self) {
        if !self.reachable.is_empty() {
            self.reachable = Reachable::default();
            self.events
                .push(CombatEvent::ReachableCellsChanged(BTreeSet::new()));
        }
    }

    fn finish(&mut self, outcome: CombatOutcome) {
        if self.state.is_ended() {
            return;
        }
        self.clear_highlights();
        for unit in self.units.values_mut() {
            unit.movement = MovementStatus::Idle;
        }
        self.grid.clear_occupancy();
        self.state = SessionState::Ended(outcome);
        info!(?outcome, turns = self.turns_taken, "Combat ended");
        self.events.push(CombatEvent::CombatEnded(outcome));
    }
}
