pub mod lstm_cell;
