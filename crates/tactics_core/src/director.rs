//! World-side owner of combat.
//!
//! The [`CombatDirector`] keeps the exploration roster: the party (leader
//! first) and the enemies on the map. It runs at most one
//! [`CombatSession`] at a time. Starting combat snapshots the roster into a
//! session; when the session ends the survivors' hp and cells are written
//! back, the dead are dropped and everyone returns to exploration mode.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::CombatConfig;
use crate::encounter::EncounterTriggers;
use crate::error::{CombatError, Result};
use crate::events::{CombatEvent, CombatOutcome};
use crate::grid::{Cell, TerrainMap};
use crate::replay::Replay;
use crate::session::{CombatSession, DamageOutcome, EncounterSetup, Intent, IntentOutcome};
use crate::unit::{CombatStats, CombatUnit, Team, UnitId};

/// How a character is currently being moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MovementMode {
    /// Free movement on the overworld.
    #[default]
    Exploring,
    /// Grid-locked, driven by the combat session.
    InCombat,
}

/// A character known to the director.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterMember {
    /// Unique identifier.
    pub id: UnitId,
    /// Display name.
    pub name: String,
    /// Side.
    pub team: Team,
    /// Character sheet.
    pub stats: CombatStats,
    /// Hit points carried between encounters.
    pub hp: i32,
    /// Cell the character stands on.
    pub cell: Cell,
    /// Current movement mode.
    #[serde(default)]
    pub mode: MovementMode,
}

impl RosterMember {
    /// Create a member at full hp.
    #[must_use]
    pub fn new(id: UnitId, name: impl Into<String>, team: Team, cell: Cell, stats: CombatStats) -> Self {
        Self {
            id,
            name: name.into(),
            team,
            stats,
            hp: stats.hp,
            cell,
            mode: MovementMode::Exploring,
        }
    }

    /// A member is alive while its hp is positive.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Snapshot for a combat session, starting from the carried hp.
    #[must_use]
    pub fn to_combat_unit(&self) -> CombatUnit {
        let mut unit = CombatUnit::new(self.id, self.name.clone(), self.team, self.cell, self.stats);
        unit.hp = self.hp;
        unit
    }
}

/// Summary of a finished encounter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombatReport {
    /// How it ended.
    pub outcome: CombatOutcome,
    /// Members removed from the roster.
    pub fallen: Vec<UnitId>,
    /// Turns played.
    pub turns: u32,
}

/// Owns the roster and the single active session.
#[derive(Debug)]
pub struct CombatDirector {
    terrain: TerrainMap,
    config: CombatConfig,
    members: BTreeMap<UnitId, RosterMember>,
    /// Party ids, leader first.
    party: Vec<UnitId>,
    /// Enemy ids in placement order.
    enemies: Vec<UnitId>,
    triggers: EncounterTriggers,
    session: Option<CombatSession>,
    recording: Option<Replay>,
    last_replay: Option<Replay>,
    last_report: Option<CombatReport>,
    events: Vec<CombatEvent>,
}

impl CombatDirector {
    /// Create a director for one map.
    #[must_use]
    pub fn new(terrain: TerrainMap, config: CombatConfig) -> Self {
        let triggers = EncounterTriggers::new(config.detection_radius);
        Self {
            terrain,
            config,
            members: BTreeMap::new(),
            party: Vec::new(),
            enemies: Vec::new(),
            triggers,
            session: None,
            recording: None,
            last_replay: None,
            last_report: None,
            events: Vec::new(),
        }
    }

    /// Add a character. Party members join behind the current leader;
    /// enemies get an armed encounter trigger.
    ///
    /// # Errors
    ///
    /// [`CombatError::InvalidSetup`] for a duplicate id,
    /// [`CombatError::SessionAlreadyActive`] during combat.
    pub fn add_member(&mut self, mut member: RosterMember) -> Result<()> {
        if self.session.is_some() {
            return Err(CombatError::SessionAlreadyActive);
        }
        if self.members.contains_key(&member.id) {
            return Err(CombatError::InvalidSetup(format!(
                "duplicate roster id {}",
                member.id
            )));
        }
        member.mode = MovementMode::Exploring;
        match member.team {
            Team::Player => self.party.push(member.id),
            Team::Enemy => {
                self.enemies.push(member.id);
                self.triggers.register(member.id);
            }
        }
        self.members.insert(member.id, member);
        Ok(())
    }

    /// Move a character on the overworld.
    ///
    /// # Errors
    ///
    /// [`CombatError::SessionAlreadyActive`] during combat,
    /// [`CombatError::UnknownUnit`] for an unknown id.
    pub fn set_cell(&mut self, id: UnitId, cell: Cell) -> Result<()> {
        if self.session.is_some() {
            return Err(CombatError::SessionAlreadyActive);
        }
        let member = self
            .members
            .get_mut(&id)
            .ok_or(CombatError::UnknownUnit(id))?;
        member.cell = cell;
        Ok(())
    }

    /// Fire the first armed enemy trigger near the party leader.
    ///
    /// Returns the enemy that noticed the party. Never fires during combat.
    pub fn detect_encounter(&mut self) -> Option<UnitId> {
        if self.session.is_some() {
            return None;
        }
        let leader = self.leader()?.cell;
        let members = &self.members;
        let enemies = self
            .enemies
            .iter()
            .filter_map(|id| members.get(id))
            .filter(|m| m.is_alive())
            .map(|m| (m.id, m.cell));
        self.triggers.detect(leader, enemies)
    }

    /// Start combat against `enemy`.
    ///
    /// Every living party member and every living enemy joins, not only the
    /// ones named. `party_ids` must all be known party members.
    ///
    /// # Errors
    ///
    /// [`CombatError::SessionAlreadyActive`] if combat is running (nothing
    /// changes), [`CombatError::UnknownUnit`] for an unknown or dead id, and
    /// any setup error from [`CombatSession::new`].
    pub fn request_start_combat(&mut self, enemy: UnitId, party_ids: &[UnitId]) -> Result<()> {
        if self.session.is_some() {
            debug!(enemy, "Start request while combat is active");
            return Err(CombatError::SessionAlreadyActive);
        }
        match self.members.get(&enemy) {
            Some(m) if m.team == Team::Enemy && m.is_alive() => {}
            _ => return Err(CombatError::UnknownUnit(enemy)),
        }
        if let Some(&bad) = party_ids.iter().find(|&&id| {
            !self.party.contains(&id) || !self.members.get(&id).is_some_and(RosterMember::is_alive)
        }) {
            return Err(CombatError::UnknownUnit(bad));
        }

        let setup = self.snapshot();
        let mut session = CombatSession::new(setup.clone())?;
        info!(
            trigger = enemy,
            players = setup.players.len(),
            enemies = setup.enemies.len(),
            "Entering combat"
        );

        for unit in setup.players.iter().chain(&setup.enemies) {
            if let Some(member) = self.members.get_mut(&unit.id) {
                member.mode = MovementMode::InCombat;
            }
        }
        self.recording = Some(Replay::new(format!("encounter-{enemy}"), setup));
        session.begin();
        self.session = Some(session);
        self.collect();
        Ok(())
    }

    /// Forward an intent to the running session.
    ///
    /// # Errors
    ///
    /// [`CombatError::NoActiveSession`] when no combat is running.
    pub fn handle(&mut self, intent: Intent) -> Result<IntentOutcome> {
        let session = self.session.as_mut().ok_or(CombatError::NoActiveSession)?;
        let outcome = session.handle(intent);
        if outcome.is_accepted() {
            if let Some(recording) = self.recording.as_mut() {
                recording.record(intent);
            }
        }
        self.collect();
        Ok(outcome)
    }

    /// Apply damage inside the running session.
    ///
    /// Damage dealt this way is not part of the recorded replay.
    ///
    /// # Errors
    ///
    /// [`CombatError::NoActiveSession`] when no combat is running.
    pub fn apply_damage(&mut self, attacker: UnitId, defender: UnitId) -> Result<Option<DamageOutcome>> {
        let session = self.session.as_mut().ok_or(CombatError::NoActiveSession)?;
        let outcome = session.apply_damage(attacker, defender);
        // An out-of-band change makes the recording unreplayable
        self.recording = None;
        self.collect();
        Ok(outcome)
    }

    /// End the running combat early. Survivors keep their current hp.
    ///
    /// # Errors
    ///
    /// [`CombatError::NoActiveSession`] when no combat is running.
    pub fn abort_combat(&mut self) -> Result<CombatReport> {
        let session = self.session.as_mut().ok_or(CombatError::NoActiveSession)?;
        session.abort();
        self.collect();
        self.last_report
            .clone()
            .ok_or(CombatError::NoActiveSession)
    }

    /// Take every buffered event, oldest first.
    pub fn drain_events(&mut self) -> Vec<CombatEvent> {
        std::mem::take(&mut self.events)
    }

    /// The running session, if any.
    #[must_use]
    pub const fn session(&self) -> Option<&CombatSession> {
        self.session.as_ref()
    }

    /// True while combat is running.
    #[must_use]
    pub const fn in_combat(&self) -> bool {
        self.session.is_some()
    }

    /// A roster entry.
    #[must_use]
    pub fn member(&self, id: UnitId) -> Option<&RosterMember> {
        self.members.get(&id)
    }

    /// The party leader, if anyone is left.
    #[must_use]
    pub fn leader(&self) -> Option<&RosterMember> {
        self.party.first().and_then(|id| self.members.get(id))
    }

    /// Party members, leader first.
    pub fn party(&self) -> impl Iterator<Item = &RosterMember> + '_ {
        self.party.iter().filter_map(|id| self.members.get(id))
    }

    /// Enemies in placement order.
    pub fn enemies(&self) -> impl Iterator<Item = &RosterMember> + '_ {
        self.enemies.iter().filter_map(|id| self.members.get(id))
    }

    /// Encounter triggers.
    #[must_use]
    pub const fn triggers(&self) -> &EncounterTriggers {
        &self.triggers
    }

    /// Report of the most recent finished combat.
    #[must_use]
    pub const fn last_report(&self) -> Option<&CombatReport> {
        self.last_report.as_ref()
    }

    /// Take the replay of the most recent finished combat.
    pub fn take_replay(&mut self) -> Option<Replay> {
        self.last_replay.take()
    }

    fn snapshot(&self) -> EncounterSetup {
        let living = |ids: &[UnitId]| -> Vec<CombatUnit> {
            ids.iter()
                .filter_map(|id| self.members.get(id))
                .filter(|m| m.is_alive())
                .map(RosterMember::to_combat_unit)
                .collect()
        };
        EncounterSetup {
            terrain: self.terrain.clone(),
            players: living(&self.party),
            enemies: living(&self.enemies),
            config: self.config.clone(),
        }
    }

    /// Pull events out of the session and conclude it if it has ended.
    fn collect(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        self.events.extend(session.drain_events());
        if session.is_ended() {
            self.conclude();
        }
    }

    fn conclude(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let Some(outcome) = session.outcome() else {
            self.session = Some(session);
            return;
        };

        let mut fallen = Vec::new();
        for member in self.members.values_mut() {
            if member.mode != MovementMode::InCombat {
                continue;
            }
            member.mode = MovementMode::Exploring;
            match session.unit(member.id) {
                Some(unit) => {
                    member.hp = unit.hp;
                    member.cell = unit.position;
                }
                None => fallen.push(member.id),
            }
        }

        for id in &fallen {
            self.members.remove(id);
            self.triggers.forget(*id);
        }
        self.party.retain(|id| !fallen.contains(id));
        self.enemies.retain(|id| !fallen.contains(id));

        if self.config.rearm_triggers_on_exit {
            for &id in &self.enemies {
                self.triggers.rearm(id);
            }
        }

        if let Some(mut replay) = self.recording.take() {
            replay.finalize(session.state_hash(), Some(outcome));
            self.last_replay = Some(replay);
        }

        info!(?outcome, fallen = fallen.len(), "Leaving combat");
        self.last_report = Some(CombatReport {
            outcome,
            fallen,
            turns: session.turns_taken(),
        });
    }
}
