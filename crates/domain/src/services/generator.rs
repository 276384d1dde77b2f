//! Alert generation.
//!
//! A pure function from a [`StateDelta`] to the alert drafts it warrants.
//! The message strings are part of the client contract; do not reword them.

use crate::models::{
    Activity, AlertData, AlertDraft, AlertType, Decision, ParticipationStatus, SenderInfo,
    StateDelta, User,
};

/// Maps a transition to the alerts it should produce, in recipient order.
///
/// Suppression rules:
/// * a re-request after rejection stays silent so the rejected user cannot
///   re-notify the organizer at will
/// * withdrawals, removals and plain status advances produce nothing
/// * no-op updates (revision unchanged) produce nothing
pub fn alerts_for_delta(delta: &StateDelta) -> Vec<AlertDraft> {
    match delta {
        StateDelta::JoinRequested {
            activity,
            requester,
            previous_status,
            ..
        } => {
            if *previous_status == Some(ParticipationStatus::Rejected) {
                return Vec::new();
            }
            vec![AlertDraft {
                recipient_id: activity.owner_id,
                alert_type: AlertType::JoinRequest,
                message: format!(
                    "{} wants to join your activity: {}",
                    requester.display_name, activity.name
                ),
                activity_id: Some(activity.id),
                activity_name: Some(activity.name.clone()),
                sender: Some(sender(requester)),
                data: Some(AlertData::JoinRequest {
                    requester_id: requester.id,
                    requester_name: requester.display_name.clone(),
                }),
            }]
        }

        StateDelta::Decided {
            activity,
            organizer,
            participation,
            decision,
        } => {
            let (alert_type, verdict) = match decision {
                Decision::Approved => (AlertType::RequestApproved, "approved"),
                Decision::Rejected => (AlertType::RequestRejected, "rejected"),
            };
            vec![AlertDraft {
                recipient_id: participation.user_id,
                alert_type,
                message: format!("Your request to join {} was {}", activity.name, verdict),
                activity_id: Some(activity.id),
                activity_name: Some(activity.name.clone()),
                sender: Some(sender(organizer)),
                data: None,
            }]
        }

        StateDelta::Left {
            activity,
            participant,
            ..
        } => vec![AlertDraft {
            recipient_id: activity.owner_id,
            alert_type: AlertType::UserLeft,
            message: format!(
                "{} has left your activity: {}",
                participant.display_name, activity.name
            ),
            activity_id: Some(activity.id),
            activity_name: Some(activity.name.clone()),
            sender: Some(sender(participant)),
            data: None,
        }],

        StateDelta::ActivityCancelled {
            activity,
            organizer,
            approved_participants,
        } => approved_participants
            .iter()
            .map(|recipient| AlertDraft {
                recipient_id: *recipient,
                alert_type: AlertType::ActivityCancelled,
                message: format!(
                    "Activity '{}' has been cancelled by the organizer",
                    activity.name
                ),
                activity_id: Some(activity.id),
                activity_name: Some(activity.name.clone()),
                sender: Some(sender(organizer)),
                data: None,
            })
            .collect(),

        StateDelta::ActivityUpdated {
            activity,
            organizer,
            approved_participants,
            revision_changed,
            update_details,
        } => {
            if !revision_changed {
                return Vec::new();
            }
            approved_participants
                .iter()
                .map(|recipient| update_draft(activity, organizer, *recipient, update_details))
                .collect()
        }

        StateDelta::RequestWithdrawn { .. }
        | StateDelta::Removed { .. }
        | StateDelta::StatusAdvanced { .. } => Vec::new(),
    }
}

fn update_draft(
    activity: &Activity,
    organizer: &User,
    recipient: uuid::Uuid,
    update_details: &str,
) -> AlertDraft {
    AlertDraft {
        recipient_id: recipient,
        alert_type: AlertType::ActivityUpdated,
        message: format!(
            "Activity '{}' has been updated: {}",
            activity.name, update_details
        ),
        activity_id: Some(activity.id),
        activity_name: Some(activity.name.clone()),
        sender: Some(sender(organizer)),
        data: Some(AlertData::ActivityUpdated {
            update_details: update_details.to_string(),
        }),
    }
}

fn sender(user: &User) -> SenderInfo {
    SenderInfo {
        id: user.id,
        name: user.display_name.clone(),
        profile_pic: user.profile_pic_url.clone(),
    }
}
