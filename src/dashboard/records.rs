//! Record edits, drives and the team directory

use super::types::*;
use super::Dashboard;
use crate::analytics::{team_directory, TeamDirectory};
use crate::error::{DashboardError, DashboardResult};
use crate::model::{Drive, Month, User};
use chrono::Utc;
use tracing::info;

impl Dashboard {
    /// Move one BDE's month record to another team leader
    pub async fn update_bde_team(&self, request: BdeTeamRequest) -> DashboardResult<MessageResponse> {
        let (Some(bde_name), Some(leader), Some(raw_month), Some(branch)) = (
            present(&request.bde_name),
            present(&request.new_team_leader),
            present(&request.month),
            present(&request.branch),
        ) else {
            return Err(DashboardError::invalid_input(
                "Missing required fields: bdeName, newTeamLeader, month, branch",
            ));
        };
        let month = Month::parse(raw_month)
            .ok_or_else(|| DashboardError::invalid_input(format!("Invalid month \"{raw_month}\".")))?;

        let _guard = self.writes.lock().await;
        let users = self.store.users().await?;
        let find = |name: &str| -> Option<&User> {
            users
                .iter()
                .find(|u| u.branch == branch && u.name_matches(name))
        };
        let bde = find(bde_name).ok_or_else(|| {
            DashboardError::not_found(format!("BDE \"{bde_name}\" not found in branch \"{branch}\"."))
        })?;
        let leader = find(leader).ok_or_else(|| {
            DashboardError::not_found(format!(
                "Team leader \"{leader}\" not found in branch \"{branch}\"."
            ))
        })?;

        // Stored names take the directory's casing
        let (bde_exact, leader_exact) = (bde.name.clone(), leader.name.clone());
        let lowered = bde_name.to_lowercase();
        let matched = self
            .store
            .update_records(
                &|r| r.month == month && r.branch == branch && r.bde_name.to_lowercase() == lowered,
                &|r| {
                    r.team_leader = leader_exact.clone();
                    r.bde_name = bde_exact.clone();
                },
            )
            .await?;
        if matched == 0 {
            return Err(DashboardError::not_found(
                "No record found for the specified BDE, month, and branch.",
            ));
        }

        info!(bde = %bde_exact, team_leader = %leader_exact, month = %month, branch, "BDE moved to new team");
        Ok(MessageResponse::ok("BDE team updated successfully."))
    }

    pub async fn update_team_name(&self, request: TeamNameRequest) -> DashboardResult<MessageResponse> {
        let (Some(leader), Some(team_name), Some(branch)) = (
            present(&request.team_leader),
            present(&request.team_name),
            present(&request.branch),
        ) else {
            return Err(DashboardError::invalid_input(
                "Missing required fields: teamLeader, teamName, branch",
            ));
        };

        let _guard = self.writes.lock().await;
        let matched = self
            .store
            .update_records(
                &|r| r.team_leader == leader && r.branch == branch,
                &|r| r.team_name = team_name.to_string(),
            )
            .await?;
        if matched == 0 {
            return Err(DashboardError::not_found(
                "No records found for the specified team leader and branch.",
            ));
        }

        info!(team_leader = leader, team_name, branch, records = matched, "Team renamed");
        Ok(MessageResponse::ok("Team name updated successfully."))
    }

    pub async fn drives(&self) -> DashboardResult<Vec<Drive>> {
        Ok(self.store.drives().await?)
    }

    pub async fn create_drive(&self, request: CreateDriveRequest) -> DashboardResult<CreatedResponse> {
        let (Some(name), Some(start), Some(start_year), Some(end), Some(end_year)) = (
            present(&request.name),
            present(&request.start_month),
            request.start_year.filter(|y| *y != 0),
            present(&request.end_month),
            request.end_year.filter(|y| *y != 0),
        ) else {
            return Err(DashboardError::invalid_input(
                "Missing required fields: name, startMonth, startYear, endMonth, endYear",
            ));
        };
        let (Some(start), Some(end)) = (Month::parse(start), Month::parse(end)) else {
            return Err(DashboardError::invalid_input("Invalid month names"));
        };

        let drive = Drive {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            start_month: start.calendar_number(),
            start_year,
            end_month: end.calendar_number(),
            end_year,
            created_at: Utc::now(),
        };

        let _guard = self.writes.lock().await;
        if self.store.drives().await?.iter().any(|d| d.same_range(&drive)) {
            return Err(DashboardError::conflict(
                "A drive with the same name and date range already exists.",
            ));
        }
        self.store.insert_drive(drive.clone()).await?;

        info!(drive = %drive.name, id = %drive.id, "Drive created");
        Ok(CreatedResponse {
            success: true,
            message: "Drive created successfully".to_string(),
            id: drive.id,
        })
    }

    /// Branch → team → members, with a designation per person
    pub async fn teams(&self) -> DashboardResult<TeamDirectory> {
        let views = self.record_views().await?;
        let users = self.store.users().await?;
        Ok(team_directory(&views, &users))
    }
}
