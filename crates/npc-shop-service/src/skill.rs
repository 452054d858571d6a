//! 技能查询与充值容量加成
//!
//! 飞镖和子弹的可充值上限会因对应的精通技能提高，每级 +10。

use async_trait::async_trait;
use npc_shared::error::NpcError;
use npc_shared::rest::RestClient;
use npc_shared::tenant::Tenant;
use serde::Deserialize;

use crate::error::Result;

/// 刺客：精准暗器
pub const ASSASSIN_CLAW_MASTERY: u32 = 4100000;
/// 夜行者：精准暗器
pub const NIGHT_WALKER_CLAW_MASTERY: u32 = 14100000;
/// 枪手：精准枪
pub const GUNSLINGER_GUN_MASTERY: u32 = 5200000;

/// 每级精通技能增加的容量
pub const BONUS_PER_LEVEL: u32 = 10;

const THROWING_STAR_CLASS: u32 = 207;
const BULLET_CLASS: u32 = 233;

/// 影响该物品充值上限的精通技能；非飞镖/子弹返回空
pub fn mastery_skills_for(template_id: u32) -> &'static [u32] {
    match template_id / 10000 {
        THROWING_STAR_CLASS => &[ASSASSIN_CLAW_MASTERY, NIGHT_WALKER_CLAW_MASTERY],
        BULLET_CLASS => &[GUNSLINGER_GUN_MASTERY],
        _ => &[],
    }
}

/// 技能服务能力
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SkillService: Send + Sync {
    /// 角色某技能的等级，未学习时为 0
    async fn skill_level(&self, tenant: &Tenant, character_id: u32, skill_id: u32) -> Result<u8>;
}

/// 累加物品的全部精通技能加成
pub async fn recharge_bonus(
    skills: &dyn SkillService,
    tenant: &Tenant,
    character_id: u32,
    template_id: u32,
) -> Result<u32> {
    let mut bonus = 0;
    for skill_id in mastery_skills_for(template_id) {
        let level = skills.skill_level(tenant, character_id, *skill_id).await?;
        bonus += BONUS_PER_LEVEL * u32::from(level);
    }
    Ok(bonus)
}

#[derive(Debug, Deserialize)]
struct SkillAttributes {
    level: u8,
}

pub struct RestSkillService {
    rest: RestClient,
}

impl RestSkillService {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }
}

#[async_trait]
impl SkillService for RestSkillService {
    async fn skill_level(&self, tenant: &Tenant, character_id: u32, skill_id: u32) -> Result<u8> {
        match self
            .rest
            .get_one::<SkillAttributes>(tenant, &format!("characters/{character_id}/skills/{skill_id}"))
            .await
        {
            Ok(skill) => Ok(skill.attributes.level),
            Err(NpcError::NotFound { .. }) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}
