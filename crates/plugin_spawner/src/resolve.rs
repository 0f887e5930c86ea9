//! The value and prize resolution pipelines.
//!
//! Both pipelines are layered and deterministic: for a fixed registry,
//! item inventory, and callback set, resolving twice yields the same
//! result. Callbacks are executed from registry snapshots, never under a
//! registry lock.

use crate::callbacks::{OverrideContext, PrizeContext};
use crate::registry::SettingDescriptor;
use crate::state::CompileRequest;
use crate::Spawner;
use pulsar_services::{ArenaId, PlayerId, PrizeCode};

impl Spawner {
    /// Resolves the final clamped value for one setting:
    /// arena default → item contribution → override callbacks (in
    /// registration order) → resource-pool reduction → range clamp.
    pub(crate) fn resolve_setting_value(
        &self,
        player: PlayerId,
        arena: ArenaId,
        request: &CompileRequest,
        descriptor: &SettingDescriptor,
        pending_prizes: i32,
    ) -> i32 {
        let mut value =
            self.config.get_int(arena, descriptor.section, descriptor.setting, descriptor.default);

        if let (Some(property), Some(hull)) = (descriptor.property, request.hull) {
            value = self.items.property_sum(player, hull, property, value);
        }

        let resolvers = self.override_callbacks.snapshot(descriptor.key.0, arena);
        if !resolvers.is_empty() {
            let ctx = OverrideContext {
                player,
                hull: request.hull,
                freq: request.freq,
                ship: request.ship,
                section: descriptor.section,
                setting: descriptor.setting,
            };
            for resolver in resolvers {
                value = resolver.resolve(&ctx, value);
            }
        }

        // Spawn consumables count toward the client's starting resource
        // pool; remove them so granting doesn't inflate it.
        if descriptor.reduce_by_prizes {
            value = value.saturating_sub(pending_prizes);
        }

        descriptor.clamp(value)
    }

    /// Resolves the spawn count for one prize: zero → prize callbacks (in
    /// registration order) → clamp to `[0, 255]`.
    pub(crate) fn resolve_prize_count(
        &self,
        player: PlayerId,
        arena: ArenaId,
        request: &CompileRequest,
        prize: PrizeCode,
    ) -> u8 {
        let resolvers = self.prize_callbacks.snapshot(prize.code() as u32, arena);
        if resolvers.is_empty() {
            return 0;
        }

        let ctx = PrizeContext {
            player,
            hull: request.hull,
            freq: request.freq,
            ship: request.ship,
            prize,
        };

        let mut count = 0i32;
        for resolver in resolvers {
            count = resolver.resolve(&ctx, count);
        }
        count.clamp(0, 255) as u8
    }
}
