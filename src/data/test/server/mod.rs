mod availability;
mod placement;
