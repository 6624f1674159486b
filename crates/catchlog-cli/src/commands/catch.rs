use catchlog_core::util::normalize_text_option;
use catchlog_core::FishCaught;

use crate::cli::CatchCommands;
use crate::commands::common::{format_catch_lines, open_service, print_records, SessionOptions};
use crate::error::CliError;

pub async fn run_catch(command: CatchCommands, options: &SessionOptions) -> Result<(), CliError> {
    let service = open_service(options).await?;

    match command {
        CatchCommands::Add {
            trip_id,
            species,
            length,
            weight,
            time,
            gear,
            details,
        } => {
            if service.get_trip_by_id(trip_id).await?.is_none() {
                return Err(CliError::NotFound(format!("Trip {trip_id}")));
            }
            let mut fish = FishCaught::new(trip_id, species);
            fish.length = length;
            fish.weight = weight;
            fish.time = normalize_text_option(time);
            fish.gear = gear
                .into_iter()
                .filter_map(|item| normalize_text_option(Some(item)))
                .collect();
            fish.details = normalize_text_option(details);
            let id = service.create_fish_caught(fish).await?;
            println!("{id}");
        }
        CatchCommands::List { trip, json } => {
            let catches = match trip {
                Some(trip_id) => service.get_fish_caught_for_trip(trip_id).await?,
                None => service.get_all_fish_caught().await?,
            };
            print_records(&catches, json, format_catch_lines, "No catches recorded.")?;
        }
        CatchCommands::Delete { id } => {
            if service.get_fish_caught_by_id(&id).await?.is_none() {
                return Err(CliError::NotFound(format!("Catch {id}")));
            }
            service.delete_fish_caught(&id).await?;
            println!("Deleted catch {id}");
        }
    }

    Ok(())
}
