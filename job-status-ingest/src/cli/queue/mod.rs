pub mod aws_sqs;
