use anyhow::{Context, anyhow};
use family_context_sdk::{
    ExchangeRate, Family, FamilyId, GlobalSettings, Theme, UserFamilyMapping,
};
use sea_orm::ActiveValue::Set;

use super::entity::{family, global_settings, mapping};

impl TryFrom<family::Model> for Family {
    type Error = anyhow::Error;

    fn try_from(m: family::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: FamilyId::new(m.id)?,
            name: m.name,
            created_at: m.created_at,
            updated_at: m.updated_at,
        })
    }
}

pub fn family_active_model(f: &Family) -> family::ActiveModel {
    family::ActiveModel {
        id: Set(f.id.to_string()),
        name: Set(f.name.clone()),
        created_at: Set(f.created_at),
        updated_at: Set(f.updated_at),
    }
}

impl TryFrom<mapping::Model> for UserFamilyMapping {
    type Error = anyhow::Error;

    fn try_from(m: mapping::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            family_id: FamilyId::new(m.family_id)?,
            family_role: m.family_role.parse().map_err(|e: String| anyhow!(e))?,
            id: m.id,
            email: m.email,
            member_id: m.member_id,
            last_active_at: m.last_active_at,
            is_local_only: m.is_local_only,
        })
    }
}

pub fn mapping_active_model(m: &UserFamilyMapping) -> mapping::ActiveModel {
    mapping::ActiveModel {
        id: Set(m.id.clone()),
        email: Set(m.email.clone()),
        family_id: Set(m.family_id.to_string()),
        family_role: Set(m.family_role.as_str().to_owned()),
        member_id: Set(m.member_id.clone()),
        last_active_at: Set(m.last_active_at),
        is_local_only: Set(m.is_local_only),
    }
}

impl TryFrom<global_settings::Model> for GlobalSettings {
    type Error = anyhow::Error;

    fn try_from(m: global_settings::Model) -> Result<Self, Self::Error> {
        let exchange_rates: Vec<ExchangeRate> =
            serde_json::from_value(m.exchange_rates).context("exchange_rates column")?;
        Ok(Self {
            theme: m.theme.parse::<Theme>().map_err(|e| anyhow!(e))?,
            language: m.language,
            last_active_family_id: m.last_active_family_id.map(FamilyId::new).transpose()?,
            exchange_rates,
            exchange_rate_auto_update: m.exchange_rate_auto_update,
            exchange_rate_last_fetch: m.exchange_rate_last_fetch,
        })
    }
}

pub fn global_settings_active_model(
    s: &GlobalSettings,
) -> anyhow::Result<global_settings::ActiveModel> {
    Ok(global_settings::ActiveModel {
        id: Set(global_settings::SINGLETON_ID.to_owned()),
        theme: Set(s.theme.as_str().to_owned()),
        language: Set(s.language.clone()),
        last_active_family_id: Set(s.last_active_family_id.as_ref().map(ToString::to_string)),
        exchange_rates: Set(serde_json::to_value(&s.exchange_rates)?),
        exchange_rate_auto_update: Set(s.exchange_rate_auto_update),
        exchange_rate_last_fetch: Set(s.exchange_rate_last_fetch),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use chrono::Utc;
    use family_context_sdk::FamilyRole;

    #[test]
    fn mapping_with_unknown_role_is_rejected() {
        let model = mapping::Model {
            id: "m1".to_owned(),
            email: "a@b.c".to_owned(),
            family_id: "fam-1".to_owned(),
            family_role: "admin".to_owned(),
            member_id: "mem-1".to_owned(),
            last_active_at: Utc::now(),
            is_local_only: false,
        };
        assert!(UserFamilyMapping::try_from(model.clone()).is_err());

        let ok = UserFamilyMapping::try_from(mapping::Model {
            family_role: "owner".to_owned(),
            ..model
        })
        .unwrap();
        assert_eq!(ok.family_role, FamilyRole::Owner);
    }

    #[test]
    fn global_settings_model_round_trip() {
        let mut settings = GlobalSettings::defaults("uk");
        settings.theme = Theme::Dark;
        settings.last_active_family_id = Some(FamilyId::new("fam-1").unwrap());
        settings.exchange_rates.push(ExchangeRate {
            from: "USD".to_owned(),
            to: "UAH".to_owned(),
            rate: 41.5,
            updated_at: None,
        });

        let am = global_settings_active_model(&settings).unwrap();
        let model = global_settings::Model {
            id: am.id.unwrap(),
            theme: am.theme.unwrap(),
            language: am.language.unwrap(),
            last_active_family_id: am.last_active_family_id.unwrap(),
            exchange_rates: am.exchange_rates.unwrap(),
            exchange_rate_auto_update: am.exchange_rate_auto_update.unwrap(),
            exchange_rate_last_fetch: am.exchange_rate_last_fetch.unwrap(),
        };
        assert_eq!(model.id, global_settings::SINGLETON_ID);
        assert_eq!(GlobalSettings::try_from(model).unwrap(), settings);
    }
}
