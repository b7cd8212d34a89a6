pub mod csv_data;
