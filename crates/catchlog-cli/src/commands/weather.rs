use catchlog_core::WeatherLog;

use crate::cli::WeatherCommands;
use crate::commands::common::{format_weather_lines, open_service, print_records, SessionOptions};
use crate::error::CliError;

pub async fn run_weather(
    command: WeatherCommands,
    options: &SessionOptions,
) -> Result<(), CliError> {
    let service = open_service(options).await?;

    match command {
        WeatherCommands::Add {
            trip_id,
            time_of_day,
            sky,
            wind_condition,
            wind_direction,
            water_temp,
            air_temp,
        } => {
            if service.get_trip_by_id(trip_id).await?.is_none() {
                return Err(CliError::NotFound(format!("Trip {trip_id}")));
            }
            let log = WeatherLog::new(trip_id, time_of_day, sky, wind_condition, wind_direction)
                .with_temperatures(water_temp, air_temp);
            let id = service.create_weather_log(log).await?;
            println!("{id}");
        }
        WeatherCommands::List { trip, json } => {
            let logs = match trip {
                Some(trip_id) => service.get_weather_logs_for_trip(trip_id).await?,
                None => service.get_all_weather_logs().await?,
            };
            print_records(&logs, json, format_weather_lines, "No weather logs recorded.")?;
        }
        WeatherCommands::Delete { id } => {
            if service.get_weather_log_by_id(&id).await?.is_none() {
                return Err(CliError::NotFound(format!("Weather log {id}")));
            }
            service.delete_weather_log(&id).await?;
            println!("Deleted weather log {id}");
        }
    }

    Ok(())
}
