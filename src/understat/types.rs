use crate::error::{Error, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One entry of Understat's `datesData` array. Numbers arrive as strings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UnderstatMatch {
    pub id: Option<Value>,
    #[serde(rename = "isResult")]
    pub is_result: bool,
    pub h: Option<UnderstatSide>,
    pub a: Option<UnderstatSide>,
    pub goals: Option<UnderstatPair>,
    #[serde(rename = "xG")]
    pub xg: Option<UnderstatPair>,
    pub datetime: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UnderstatSide {
    pub id: Option<String>,
    pub title: Option<String>,
    pub short_title: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UnderstatPair {
    pub h: Option<Value>,
    pub a: Option<Value>,
}

/// Bare JSON variant of the league endpoint.
#[derive(Debug, Deserialize)]
pub struct LeagueData {
    pub dates: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FixtureRecord {
    pub home_team: String,
    pub away_team: String,
    pub match_date: NaiveDateTime,
    pub season: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub home_team: String,
    pub away_team: String,
    pub match_date: NaiveDateTime,
    pub home_score: i32,
    pub away_score: i32,
    pub home_xg: f64,
    pub away_xg: f64,
}

impl UnderstatMatch {
    fn label(&self) -> String {
        match &self.id {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "<no id>".to_string(),
        }
    }

    fn team(&self, side: Option<&UnderstatSide>, which: &str) -> Result<String> {
        side.and_then(|s| s.title.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .ok_or_else(|| Error::MalformedRecord(format!("match {}: missing {} team", self.label(), which)))
    }

    fn date(&self) -> Result<NaiveDateTime> {
        let raw = self
            .datetime
            .as_deref()
            .ok_or_else(|| Error::MalformedRecord(format!("match {}: missing datetime", self.label())))?;
        NaiveDateTime::parse_from_str(raw.trim(), DATETIME_FORMAT)
            .map_err(|e| Error::MalformedRecord(format!("match {}: bad datetime '{}': {}", self.label(), raw, e)))
    }

    // Understat quotes its numbers, but plain JSON numbers are accepted too
    fn number<T: std::str::FromStr>(&self, value: Option<&Value>, field: &str) -> Result<T> {
        let raw = match value {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(Error::MalformedRecord(format!("match {}: missing {}", self.label(), field))),
        };
        raw.parse()
            .map_err(|_| Error::MalformedRecord(format!("match {}: bad {} '{}'", self.label(), field, raw)))
    }

    pub fn to_fixture(&self, season: &str) -> Result<FixtureRecord> {
        Ok(FixtureRecord {
            home_team: self.team(self.h.as_ref(), "home")?,
            away_team: self.team(self.a.as_ref(), "away")?,
            match_date: self.date()?,
            season: season.to_string(),
        })
    }

    pub fn to_result(&self) -> Result<ResultRecord> {
        let goals = self.goals.as_ref();
        let xg = self.xg.as_ref();

        Ok(ResultRecord {
            home_team: self.team(self.h.as_ref(), "home")?,
            away_team: self.team(self.a.as_ref(), "away")?,
            match_date: self.date()?,
            home_score: self.number(goals.and_then(|g| g.h.as_ref()), "home goals")?,
            away_score: self.number(goals.and_then(|g| g.a.as_ref()), "away goals")?,
            home_xg: self.number(xg.and_then(|x| x.h.as_ref()), "home xG")?,
            away_xg: self.number(xg.and_then(|x| x.a.as_ref()), "away xG")?,
        })
    }
}
