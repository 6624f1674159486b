use catchlog_core::util::normalize_text_option;
use catchlog_core::{FishCaught, Trip, WeatherLog};
use serde::Serialize;

use crate::cli::{TripChanges, TripCommands};
use crate::commands::common::{
    format_catch_lines, format_trip_lines, format_weather_lines, open_service, print_records,
    SessionOptions,
};
use crate::error::CliError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripDetails {
    #[serde(flatten)]
    pub trip: Trip,
    pub weather_logs: Vec<WeatherLog>,
    pub fish_caught: Vec<FishCaught>,
}

pub async fn run_trip(command: TripCommands, options: &SessionOptions) -> Result<(), CliError> {
    let service = open_service(options).await?;

    match command {
        TripCommands::Add {
            date,
            water,
            location,
            hours,
            companions,
            notes,
        } => {
            let mut trip = Trip::new(date, water, location);
            trip.hours = hours;
            trip.companions = normalize_text_option(companions);
            trip.notes = normalize_text_option(notes);
            let id = service.create_trip(trip).await?;
            println!("{id}");
        }
        TripCommands::List { date, json } => {
            let trips = match date.as_deref() {
                Some(date) => service.get_trips_by_date(date).await?,
                None => service.get_all_trips().await?,
            };
            print_records(&trips, json, format_trip_lines, "No trips recorded.")?;
        }
        TripCommands::Show { id, json } => {
            let trip = service
                .get_trip_by_id(id)
                .await?
                .ok_or_else(|| CliError::NotFound(format!("Trip {id}")))?;
            let details = TripDetails {
                weather_logs: service.get_weather_logs_for_trip(id).await?,
                fish_caught: service.get_fish_caught_for_trip(id).await?,
                trip,
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&details)?);
            } else {
                for line in format_trip_details(&details) {
                    println!("{line}");
                }
            }
        }
        TripCommands::Edit { id, changes } => {
            let trip = service
                .get_trip_by_id(id)
                .await?
                .ok_or_else(|| CliError::NotFound(format!("Trip {id}")))?;
            let edited = apply_trip_changes(trip, changes)?;
            service.update_trip(&edited).await?;
            println!("Updated trip {id}");
        }
        TripCommands::Delete { id } => {
            if service.get_trip_by_id(id).await?.is_none() {
                return Err(CliError::NotFound(format!("Trip {id}")));
            }
            service.delete_trip(id).await?;
            println!("Deleted trip {id}");
        }
    }

    Ok(())
}

/// Overlay the given fields; blank companions or notes clear the field.
pub fn apply_trip_changes(mut trip: Trip, changes: TripChanges) -> Result<Trip, CliError> {
    if changes == TripChanges::default() {
        return Err(CliError::NoChanges);
    }

    if let Some(date) = changes.date {
        trip.date = date;
    }
    if let Some(water) = changes.water {
        trip.water = water;
    }
    if let Some(location) = changes.location {
        trip.location = location;
    }
    if let Some(hours) = changes.hours {
        trip.hours = Some(hours);
    }
    if let Some(companions) = changes.companions {
        trip.companions = normalize_text_option(Some(companions));
    }
    if let Some(notes) = changes.notes {
        trip.notes = normalize_text_option(Some(notes));
    }
    Ok(trip)
}

pub fn format_trip_details(details: &TripDetails) -> Vec<String> {
    let trip = &details.trip;
    let mut lines = vec![format!(
        "Trip {} on {}: {} ({})",
        trip.id, trip.date, trip.water, trip.location
    )];
    if let Some(hours) = trip.hours {
        lines.push(format!("  hours:      {hours:.1}"));
    }
    if let Some(companions) = trip.companions.as_deref() {
        lines.push(format!("  companions: {companions}"));
    }
    if let Some(notes) = trip.notes.as_deref() {
        lines.push(format!("  notes:      {notes}"));
    }

    lines.push(format!("Weather ({})", details.weather_logs.len()));
    lines.extend(
        format_weather_lines(&details.weather_logs)
            .into_iter()
            .map(|line| format!("  {line}")),
    );
    lines.push(format!("Catches ({})", details.fish_caught.len()));
    lines.extend(
        format_catch_lines(&details.fish_caught)
            .into_iter()
            .map(|line| format!("  {line}")),
    );
    lines
}
