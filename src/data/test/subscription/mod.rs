mod candidates;
mod links;
